//! Payload definitions
//!
//! Typed `d` fields for the handshake and liveness messages. Dispatch data is
//! forwarded as raw JSON and never decoded here, except READY.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shardline_core::Intents;
use std::fmt;

/// Shard identity: index and total shard count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    pub id: u32,
    pub total: u32,
}

impl ShardId {
    pub const ONE: Self = Self { id: 0, total: 1 };

    /// Returns `None` unless `id < total`
    #[must_use]
    pub fn new(id: u32, total: u32) -> Option<Self> {
        (id < total).then_some(Self { id, total })
    }

    /// Identify bucket this shard belongs to
    #[must_use]
    pub fn group(self, max_concurrency: u32) -> u32 {
        self.id % max_concurrency.max(1)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.id, self.total)
    }
}

impl Serialize for ShardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.id, self.total].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [id, total] = <[u32; 2]>::deserialize(deserializer)?;
        Self::new(id, total)
            .ok_or_else(|| D::Error::custom(format!("shard {id} out of range for {total}")))
    }
}

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds; zero if the server omitted it
    #[serde(default)]
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    pub intents: Intents,
    pub shard: ShardId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u8>,
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "shardline".to_string(),
            device: "shardline".to_string(),
        }
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: Option<u64>,
}

/// Data of the READY dispatch
///
/// Only the fields the session itself needs; the full object still goes to
/// the event sink.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub shard: Option<ShardId>,
    #[serde(default, rename = "v")]
    pub version: Option<u8>,
}
