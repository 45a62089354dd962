//! Gateway opcodes
//!
//! Only the opcodes this client sends or reacts to are modelled. Frames with
//! any other opcode fail to decode and are skipped by the session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the socket may send an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to gateway
    Send,
    /// Gateway to client
    Receive,
    Both,
}

/// Gateway opcode, encoded as a bare integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OpCode {
    /// Event dispatch carrying `s` and `t`
    Dispatch,
    Heartbeat,
    Identify,
    Resume,
    /// Gateway asks for a reconnect followed by Resume
    Reconnect,
    /// `d` says whether the session can still be resumed
    InvalidSession,
    /// First frame on every socket, carries the heartbeat interval
    Hello,
    HeartbeatAck,
}

/// Raw value that is not a known opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown gateway opcode {0}")]
pub struct UnknownOpCode(pub u8);

static TABLE: [(OpCode, u8, Direction); 8] = [
    (OpCode::Dispatch, 0, Direction::Receive),
    (OpCode::Heartbeat, 1, Direction::Both),
    (OpCode::Identify, 2, Direction::Send),
    (OpCode::Resume, 6, Direction::Send),
    (OpCode::Reconnect, 7, Direction::Receive),
    (OpCode::InvalidSession, 9, Direction::Receive),
    (OpCode::Hello, 10, Direction::Receive),
    (OpCode::HeartbeatAck, 11, Direction::Receive),
];

impl OpCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        TABLE
            .iter()
            .find(|(_, code, _)| *code == value)
            .map(|(op, _, _)| *op)
    }

    fn entry(self) -> &'static (OpCode, u8, Direction) {
        // Every variant has exactly one row
        &TABLE[self as usize]
    }

    pub fn as_u8(self) -> u8 {
        self.entry().1
    }

    pub fn direction(self) -> Direction {
        self.entry().2
    }

    /// The client may put this opcode on the wire
    pub fn is_sendable(self) -> bool {
        matches!(self.direction(), Direction::Send | Direction::Both)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(UnknownOpCode(value))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op.as_u8()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}/{}", self.as_u8())
    }
}
