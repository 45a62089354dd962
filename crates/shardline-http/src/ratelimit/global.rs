//! Process-wide lockout

use super::deadline_after;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Halts every bucket while a global rate limit is in effect
#[derive(Debug, Default)]
pub struct GlobalLimiter {
    until: Mutex<Option<Instant>>,
}

impl GlobalLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock all buckets for `duration`, extending any existing lockout
    pub fn lock_for(&self, duration: Duration) {
        let at = deadline_after(duration);
        let mut until = self.until.lock();
        if until.map_or(true, |current| current < at) {
            *until = Some(at);
        }
    }

    /// Remaining lockout time, if any
    pub fn wait_time(&self) -> Option<Duration> {
        let mut until = self.until.lock();
        match *until {
            Some(at) if at > Instant::now() => Some(at - Instant::now()),
            Some(_) => {
                *until = None;
                None
            }
            None => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.wait_time().is_some()
    }

    /// Suspend until no global lockout is in effect
    pub async fn wait(&self) {
        while let Some(delay) = self.wait_time() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting for global rate limit");
            sleep(delay).await;
        }
    }
}
