//! Quota tracking

mod bucket;
mod global;

pub use bucket::{BucketSnapshot, RateLimitBucket};
pub use global::GlobalLimiter;

use crate::codec::MAX_DELAY;
use std::time::Duration;
use tokio::time::Instant;

/// Instant `delay` from now, with the delay capped at [`MAX_DELAY`]
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(MAX_DELAY)).unwrap_or(now)
}
