//! Single-shard gateway sessions

mod heartbeat;
mod session;
mod state;

pub use heartbeat::Heartbeater;
pub use session::{GatewaySession, SessionSettings};
pub use state::{AuthMode, SessionSnapshot, SessionState};
