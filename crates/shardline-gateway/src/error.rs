//! Gateway error types

use crate::protocol::CloseCode;
use std::time::Duration;

/// Result alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by gateway sessions and the coordinator
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Socket could not be opened or failed mid-stream
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// Outgoing payload could not be encoded
    #[error("failed to encode gateway payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Server closed the session with a code that must not be retried
    #[error("gateway closed the session with code {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    /// No fresh sessions may be started until the quota resets
    #[error("session start limit exhausted, resets in {reset_after:?}")]
    SessionStartLimitExhausted { reset_after: Duration },

    #[error("shard {shard_id} is out of range for {shard_count} shards")]
    InvalidShard { shard_id: u32, shard_count: u32 },

    /// Bearer tokens cannot open gateway sessions
    #[error("this token type cannot connect to the gateway")]
    GatewayNotAllowed,

    /// A session task panicked or was aborted
    #[error("session task failed: {0}")]
    TaskFailed(String),
}

impl GatewayError {
    /// Known close code behind a fatal close
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::FatalClose { code, .. } => CloseCode::from_u16(*code),
            _ => None,
        }
    }

    /// True for errors that stop a session for good
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FatalClose { .. }
                | Self::SessionStartLimitExhausted { .. }
                | Self::InvalidShard { .. }
                | Self::GatewayNotAllowed
        )
    }
}
