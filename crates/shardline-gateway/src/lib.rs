//! Gateway client
//!
//! Persistent WebSocket sessions to the real-time gateway, one per shard:
//! - `protocol` - opcodes, close codes, and payloads
//! - `events` - known dispatch event names
//! - `session` - a single shard's connection state machine
//! - `coordinator` - multi-shard supervision and identify pacing
//! - `transport` - the WebSocket seam
//! - `sink` - where dispatch events are delivered

pub mod coordinator;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;

#[cfg(test)]
mod testing;

pub use coordinator::{
    CoordinatorSettings, GatewayDescriptor, IdentifyPermit, IdentifyQueue, SessionCoordinator,
    SessionStartLimit,
};
pub use error::{GatewayError, Result};
pub use events::GatewayEventType;
pub use protocol::{CloseCode, CloseDisposition, GatewayMessage, IdentifyProperties, OpCode, ShardId};
pub use session::{AuthMode, GatewaySession, SessionSettings, SessionSnapshot, SessionState};
pub use sink::{DispatchEvent, EventSink};
pub use transport::{Connection, Connector, InboundFrame, OutboundFrame, TungsteniteConnector};
