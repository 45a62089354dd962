//! Per-route quota bucket

use super::deadline_after;
use crate::codec::RateLimitHeaders;
use crate::route::BucketKey;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct BucketState {
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    bucket_id: Option<String>,
}

/// One quota domain
///
/// State is only mutated by the bucket's worker, which executes one exchange
/// at a time. The lock keeps snapshots from observing a torn update.
#[derive(Debug)]
pub struct RateLimitBucket {
    key: BucketKey,
    state: Mutex<BucketState>,
}

/// Point-in-time view of a bucket for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub key: BucketKey,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_in: Option<Duration>,
    pub bucket_id: Option<String>,
}

impl RateLimitBucket {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            state: Mutex::new(BucketState::default()),
        }
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// How long the next request must wait for quota
    ///
    /// Once an exhausted window has elapsed, `remaining` is refilled to `limit`.
    pub fn wait_time(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.remaining != Some(0) {
            return None;
        }

        match state.reset_at {
            Some(at) if at > now => Some(at - now),
            _ => {
                state.remaining = state.limit.map(|limit| limit.max(1));
                state.reset_at = None;
                None
            }
        }
    }

    /// Take one request from the window ahead of the response
    pub fn consume(&self) {
        let mut state = self.state.lock();
        if let Some(remaining) = state.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Overwrite local estimates with the server-reported quota
    pub fn update(&self, headers: &RateLimitHeaders) {
        if !headers.has_quota() {
            return;
        }

        let mut state = self.state.lock();
        if let Some(limit) = headers.limit {
            state.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            state.remaining = Some(remaining);
        }
        if let Some(reset_in) = headers.reset_in() {
            state.reset_at = Some(deadline_after(reset_in));
        }
        if let Some(id) = &headers.bucket {
            state.bucket_id = Some(id.clone());
        }
    }

    /// Mark the bucket empty until `retry_after` has elapsed
    pub fn exhaust(&self, retry_after: Duration) {
        let mut state = self.state.lock();
        state.remaining = Some(0);
        state.reset_at = Some(deadline_after(retry_after));
    }

    pub fn snapshot(&self) -> BucketSnapshot {
        let now = Instant::now();
        let state = self.state.lock();
        BucketSnapshot {
            key: self.key.clone(),
            limit: state.limit,
            remaining: state.remaining,
            reset_in: state.reset_at.map(|at| at.saturating_duration_since(now)),
            bucket_id: state.bucket_id.clone(),
        }
    }
}
