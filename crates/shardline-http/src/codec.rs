//! REST response metadata
//!
//! Decodes quota headers and the JSON bodies of error responses.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const HEADER_BUCKET: &str = "x-ratelimit-bucket";
pub const HEADER_GLOBAL: &str = "x-ratelimit-global";
pub const HEADER_SCOPE: &str = "x-ratelimit-scope";
pub const HEADER_RETRY_AFTER: &str = "retry-after";
pub const HEADER_AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Longest wait any server-reported delay is allowed to impose
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Quota information reported by the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Absolute reset time in epoch seconds
    pub reset: Option<f64>,
    /// Seconds until reset, measured by the server
    pub reset_after: Option<f64>,
    pub bucket: Option<String>,
    pub global: bool,
    pub scope: Option<String>,
    pub retry_after: Option<f64>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

fn seconds(value: f64) -> Option<Duration> {
    if value.is_nan() || value < 0.0 {
        return None;
    }
    let delay = Duration::try_from_secs_f64(value).unwrap_or(MAX_DELAY);
    Some(delay.min(MAX_DELAY))
}

impl RateLimitHeaders {
    pub fn parse(headers: &HeaderMap) -> Self {
        Self {
            limit: header_parse(headers, HEADER_LIMIT),
            remaining: header_parse(headers, HEADER_REMAINING),
            reset: header_parse(headers, HEADER_RESET),
            reset_after: header_parse(headers, HEADER_RESET_AFTER),
            bucket: header_str(headers, HEADER_BUCKET).map(str::to_string),
            global: header_str(headers, HEADER_GLOBAL)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: header_str(headers, HEADER_SCOPE).map(str::to_string),
            retry_after: header_parse(headers, HEADER_RETRY_AFTER),
        }
    }

    /// True if the response carried any bucket quota at all
    pub fn has_quota(&self) -> bool {
        self.limit.is_some() || self.remaining.is_some()
    }

    /// Delay requested by the `Retry-After` header
    pub fn retry_after_delay(&self) -> Option<Duration> {
        self.retry_after.and_then(seconds)
    }

    /// Time until the bucket resets
    ///
    /// `reset_after` wins when present since it does not depend on clock
    /// agreement with the server. The absolute `reset` is only a fallback.
    pub fn reset_in(&self) -> Option<Duration> {
        if let Some(after) = self.reset_after.and_then(seconds) {
            return Some(after);
        }

        let reset = self.reset?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        seconds((reset - now).max(0.0))
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitedBody {
    #[serde(default)]
    pub message: String,
    /// Seconds to wait before retrying
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub code: Option<u32>,
}

impl RateLimitedBody {
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    pub fn retry_after(&self) -> Duration {
        seconds(self.retry_after).unwrap_or_default()
    }
}

/// Decoded error body of a 4xx response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub message: String,
    /// Per-field validation errors, left undecoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Decode the body, falling back to its raw text as the message
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| Self {
            code: None,
            message: String::from_utf8_lossy(body).into_owned(),
            errors: None,
        })
    }
}
