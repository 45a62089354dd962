//! # shardline-core
//!
//! Value objects shared by the gateway and REST layers: snowflake IDs,
//! gateway intents, and credentials. No I/O lives here.

pub mod value_objects;

// Re-export commonly used types at crate root
pub use value_objects::{
    Intents, Snowflake, SnowflakeParseError, Token, TokenKind, TokenParseError,
};
