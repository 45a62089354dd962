//! Route templates and bucket keys
//!
//! A route is a method plus a path template such as
//! `/channels/{channel_id}/messages/{message_id}`. Compiling a route fills in
//! the parameters and derives the [`BucketKey`] that decides which quota
//! domain the request belongs to.

use crate::error::RouteError;
use reqwest::Method;
use std::fmt;

/// Parameters that partition quota independently per distinct value
pub const MAJOR_PARAMETERS: [&str; 4] = ["channel_id", "guild_id", "webhook_id", "webhook_token"];

/// Identity of one rate limit bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    method: Method,
    template: String,
    major: Vec<(String, String)>,
}

impl BucketKey {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Major parameter values in template order
    pub fn major_params(&self) -> &[(String, String)] {
        &self.major
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)?;
        for (name, value) in &self.major {
            // Webhook tokens are credentials
            if name == "webhook_token" {
                write!(f, " {name}=*")?;
            } else {
                write!(f, " {name}={value}")?;
            }
        }
        Ok(())
    }
}

/// A method and path template with its parameter values
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    template: String,
    params: Vec<(String, String)>,
}

enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

impl Route {
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
            params: Vec::new(),
        }
    }

    pub fn get(template: impl Into<String>) -> Self {
        Self::new(Method::GET, template)
    }

    pub fn post(template: impl Into<String>) -> Self {
        Self::new(Method::POST, template)
    }

    pub fn patch(template: impl Into<String>) -> Self {
        Self::new(Method::PATCH, template)
    }

    pub fn put(template: impl Into<String>) -> Self {
        Self::new(Method::PUT, template)
    }

    pub fn delete(template: impl Into<String>) -> Self {
        Self::new(Method::DELETE, template)
    }

    /// Set a template parameter, replacing any earlier value
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn segments(&self) -> Result<Vec<Segment<'_>>, RouteError> {
        let malformed = |reason| RouteError::Malformed {
            template: self.template.clone(),
            reason,
        };

        if !self.template.starts_with('/') {
            return Err(malformed("template must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut rest = self.template.as_str();
        while !rest.is_empty() {
            match rest.find(['{', '}']) {
                None => {
                    segments.push(Segment::Literal(rest));
                    break;
                }
                Some(idx) if rest.as_bytes()[idx] == b'}' => {
                    return Err(malformed("unmatched '}'"));
                }
                Some(idx) => {
                    if idx > 0 {
                        segments.push(Segment::Literal(&rest[..idx]));
                    }
                    let after = &rest[idx + 1..];
                    let close = after.find('}').ok_or_else(|| malformed("unclosed '{'"))?;
                    let name = &after[..close];
                    if name.is_empty() || name.contains('{') {
                        return Err(malformed("invalid parameter name"));
                    }
                    segments.push(Segment::Param(name));
                    rest = &after[close + 1..];
                }
            }
        }

        Ok(segments)
    }

    fn value_of(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Fill in the template and derive the bucket key
    pub fn compile(&self) -> Result<(String, BucketKey), RouteError> {
        let segments = self.segments()?;

        let mut path = String::with_capacity(self.template.len());
        let mut major = Vec::new();
        let mut used = Vec::new();

        for segment in &segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(name) => {
                    let value = self
                        .value_of(name)
                        .ok_or_else(|| RouteError::MissingParam((*name).to_string()))?;
                    if value.is_empty() || value.contains(['/', '?', '#']) {
                        return Err(RouteError::InvalidValue((*name).to_string()));
                    }
                    path.push_str(value);
                    used.push(*name);
                    if MAJOR_PARAMETERS.contains(name) {
                        major.push(((*name).to_string(), value.to_string()));
                    }
                }
            }
        }

        if let Some((unknown, _)) = self.params.iter().find(|(n, _)| !used.contains(&n.as_str())) {
            return Err(RouteError::UnknownParam(unknown.clone()));
        }

        let key = BucketKey {
            method: self.method.clone(),
            template: self.template.clone(),
            major,
        };

        Ok((path, key))
    }
}
