//! Error types for REST requests

use crate::codec::ApiErrorBody;
use reqwest::StatusCode;

/// Result alias for REST operations
pub type Result<T> = std::result::Result<T, RequestError>;

/// Programming mistakes in a route, detected before submission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// Template references a parameter that was not supplied
    #[error("missing route parameter: {0}")]
    MissingParam(String),

    /// A parameter was supplied that the template does not use
    #[error("unknown route parameter: {0}")]
    UnknownParam(String),

    /// Parameter value would escape its path segment
    #[error("invalid value for route parameter {0}")]
    InvalidValue(String),

    /// Template is not a valid path
    #[error("malformed route template {template:?}: {reason}")]
    Malformed {
        template: String,
        reason: &'static str,
    },
}

/// Failures of the underlying HTTP exchange
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("http client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Client(err.to_string())
        }
    }
}

/// Errors delivered to the caller of a submitted request
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Request body could not be serialized
    #[error("failed to encode request body: {0}")]
    Body(#[source] serde_json::Error),

    /// Non-retryable client error (4xx other than 429)
    #[error("http {status}: {}", .body.message)]
    Http { status: StatusCode, body: ApiErrorBody },

    /// Server error that persisted through every retry
    #[error("server error {status} after {attempts} attempts")]
    Server { status: StatusCode, attempts: u32 },

    /// Transport failure that persisted through every retry
    #[error("transport error after {attempts} attempts: {source}")]
    Transport {
        #[source]
        source: TransportError,
        attempts: u32,
    },

    /// Response body did not match the expected shape
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Server kept answering 429 past the retry budget
    #[error("still rate limited after {attempts} attempts")]
    RateLimitRetriesExhausted { attempts: u32 },

    #[error("request scheduler is shutting down")]
    ShuttingDown,
}

impl RequestError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// API error code from the response body, if any
    pub fn api_code(&self) -> Option<u32> {
        match self {
            Self::Http { body, .. } => body.code,
            _ => None,
        }
    }
}
