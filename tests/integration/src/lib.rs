//! Integration test utilities
//!
//! In-process mock servers for the REST API and the gateway, so the client
//! can be exercised end to end over real sockets.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
