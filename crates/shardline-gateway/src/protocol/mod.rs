//! Gateway protocol definitions
//!
//! Envelope, opcodes, close codes, and the payloads this client exchanges.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, CloseDisposition};
pub use messages::GatewayMessage;
pub use opcodes::{Direction, OpCode, UnknownOpCode};
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload, ResumePayload, ShardId,
};
