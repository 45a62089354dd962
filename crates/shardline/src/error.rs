//! Client error types

use shardline_common::ConfigError;
use shardline_gateway::GatewayError;
use shardline_http::{RequestError, TransportError};

pub type Result<T> = std::result::Result<T, ClientError>;

/// Any failure surfaced by [`crate::Client`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built
    #[error("http transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("request failed: {0}")]
    Request(#[from] RequestError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
