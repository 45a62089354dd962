//! Identify pacing
//!
//! Shards are grouped by `shard_id % max_concurrency`. Within a group only one
//! shard may be identifying at a time and consecutive identifies are spaced by
//! a minimum interval; groups proceed independently. Every identify also draws
//! from the shared session start budget.

use super::descriptor::SessionStartLimit;
use crate::error::GatewayError;
use crate::protocol::ShardId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::time::{sleep_until, Instant};

/// Window Discord uses to replenish session starts after the first reset
const START_LIMIT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct StartBudget {
    total: u32,
    remaining: u32,
    reset_at: Instant,
}

impl StartBudget {
    fn take(&mut self) -> Result<u32, GatewayError> {
        let now = Instant::now();
        if now >= self.reset_at && self.remaining < self.total {
            tracing::info!(total = self.total, "Session start limit replenished");
            self.remaining = self.total;
            self.reset_at = now + START_LIMIT_WINDOW;
        }

        if self.remaining == 0 {
            return Err(GatewayError::SessionStartLimitExhausted {
                reset_after: self.reset_at.saturating_duration_since(now),
            });
        }

        self.remaining -= 1;
        Ok(self.remaining)
    }
}

/// Slot in an identify group, held until the session is READY
///
/// Dropping the permit frees the group for the next shard, which still waits
/// out the spacing measured from this identify.
#[derive(Debug)]
pub struct IdentifyPermit {
    shard: ShardId,
    group: u32,
    _slot: OwnedMutexGuard<Option<Instant>>,
}

impl IdentifyPermit {
    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn group(&self) -> u32 {
        self.group
    }
}

/// Shared identify gate handed to every session
#[derive(Debug)]
pub struct IdentifyQueue {
    spacing: Duration,
    groups: Vec<Arc<tokio::sync::Mutex<Option<Instant>>>>,
    budget: Mutex<StartBudget>,
}

impl IdentifyQueue {
    pub fn new(limit: &SessionStartLimit, spacing: Duration) -> Self {
        let concurrency = limit.max_concurrency.max(1) as usize;
        Self {
            spacing,
            groups: (0..concurrency)
                .map(|_| Arc::new(tokio::sync::Mutex::new(None)))
                .collect(),
            budget: Mutex::new(StartBudget {
                total: limit.total,
                remaining: limit.remaining,
                reset_at: Instant::now() + limit.reset_after(),
            }),
        }
    }

    pub fn max_concurrency(&self) -> u32 {
        self.groups.len() as u32
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    pub fn remaining_starts(&self) -> u32 {
        self.budget.lock().remaining
    }

    /// Wait for this shard's identify slot
    ///
    /// Suspends until no other shard of the group holds a permit and the
    /// spacing since the group's last identify has elapsed.
    pub async fn acquire(&self, shard: ShardId) -> Result<IdentifyPermit, GatewayError> {
        let group = shard.group(self.max_concurrency());
        let slot = Arc::clone(&self.groups[group as usize]);
        let mut guard = slot.lock_owned().await;

        if let Some(last) = *guard {
            let ready_at = last + self.spacing;
            if ready_at > Instant::now() {
                tracing::debug!(
                    shard = %shard,
                    group,
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Waiting for identify spacing"
                );
                sleep_until(ready_at).await;
            }
        }

        let remaining = self.budget.lock().take()?;
        *guard = Some(Instant::now());

        tracing::debug!(shard = %shard, group, remaining, "Identify slot acquired");

        Ok(IdentifyPermit {
            shard,
            group,
            _slot: guard,
        })
    }
}
