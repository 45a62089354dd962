//! Session state

use crate::protocol::ShardId;
use std::fmt;
use std::time::Duration;

/// Which handshake is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Identify,
    Resume,
}

/// Connection state machine
///
/// `Disconnected` is initial and `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for HELLO
    AwaitingHello,
    /// Identify or Resume sent (or waiting for an identify slot)
    Authenticating(AuthMode),
    /// READY or RESUMED received
    Ready,
    /// Connection lost, a new socket will be opened
    Reconnecting,
    /// Shut down or fatally closed
    Closed,
}

impl SessionState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::AwaitingHello => "AwaitingHello",
            Self::Authenticating(AuthMode::Identify) => "Identifying",
            Self::Authenticating(AuthMode::Resume) => "Resuming",
            Self::Ready => "Ready",
            Self::Reconnecting => "Reconnecting",
            Self::Closed => "Closed",
        }
    }

    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observable view of a session, published on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub shard: ShardId,
    pub state: SessionState,
    pub sequence: Option<u64>,
    pub session_id: Option<String>,
    /// Round trip of the last acknowledged heartbeat
    pub latency: Option<Duration>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn new(shard: ShardId) -> Self {
        Self {
            shard,
            state: SessionState::Disconnected,
            sequence: None,
            session_id: None,
            latency: None,
        }
    }
}
