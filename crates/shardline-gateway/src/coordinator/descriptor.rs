//! Bootstrap descriptor from `GET /gateway/bot`

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where to connect and how many sessions may be started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayDescriptor {
    pub url: String,
    /// Recommended shard count
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub session_start_limit: SessionStartLimit,
}

/// Session start quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets to `total`
    pub reset_after: u64,
    /// Number of identify groups that may run concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_shards() -> u32 {
    1
}

fn default_max_concurrency() -> u32 {
    1
}

impl Default for SessionStartLimit {
    /// Limits assumed when only `GET /gateway` was available
    fn default() -> Self {
        Self {
            total: 1000,
            remaining: 1000,
            reset_after: 0,
            max_concurrency: 1,
        }
    }
}

impl SessionStartLimit {
    #[must_use]
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after)
    }
}

impl GatewayDescriptor {
    /// Descriptor with default limits for a bare gateway URL
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shards: default_shards(),
            session_start_limit: SessionStartLimit::default(),
        }
    }
}
