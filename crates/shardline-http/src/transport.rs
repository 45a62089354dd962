//! HTTP transport
//!
//! The scheduler talks to the network through [`HttpTransport`], so tests
//! can substitute scripted responses.

use crate::codec::HEADER_AUDIT_LOG_REASON;
use crate::error::TransportError;
use crate::request::{Request, Response};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use shardline_core::Token;
use std::time::Duration;

/// Executes one HTTP exchange
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError>;
}

/// reqwest-backed transport against a fixed API base URL
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(
        base_url: impl Into<String>,
        token: &Token,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut auth = HeaderValue::from_str(&token.header_value())
            .map_err(|_| TransportError::InvalidHeader("Authorization"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self.client.request(request.method().clone(), url);

        if let Some(body) = request.body() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        if let Some(reason) = request.audit_reason() {
            let value = HeaderValue::from_str(reason)
                .map_err(|_| TransportError::InvalidHeader("X-Audit-Log-Reason"))?;
            builder = builder.header(HEADER_AUDIT_LOG_REASON, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        tracing::trace!(
            method = %request.method(),
            path = %request.path(),
            status = status.as_u16(),
            "HTTP exchange complete"
        );

        Ok(Response::new(status, headers, body))
    }
}
