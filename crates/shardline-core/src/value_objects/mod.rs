//! Value objects

mod intents;
mod snowflake;
mod token;

pub use intents::Intents;
pub use snowflake::{Snowflake, SnowflakeParseError};
pub use token::{Token, TokenKind, TokenParseError};
