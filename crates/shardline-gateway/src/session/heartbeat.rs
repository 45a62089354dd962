//! Heartbeat bookkeeping
//!
//! Pure timing state; the session's event loop sleeps until [`Heartbeater::next_beat`]
//! and reports sends and acks back here.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks the heartbeat schedule of one connection
#[derive(Debug, Default)]
pub struct Heartbeater {
    interval: Option<Duration>,
    next_at: Option<Instant>,
    awaiting_ack: bool,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
}

impl Heartbeater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start beating with a random first delay in `[0, interval)`
    pub fn start(&mut self, interval: Duration) {
        let first = match u64::try_from(interval.as_millis()) {
            Ok(ms) if ms > 0 => Duration::from_millis(rand::thread_rng().gen_range(0..ms)),
            _ => Duration::ZERO,
        };
        self.start_with_delay(interval, first);
    }

    /// Start beating with an explicit first delay
    pub fn start_with_delay(&mut self, interval: Duration, first: Duration) {
        self.interval = Some(interval);
        self.next_at = Some(Instant::now() + first);
        self.awaiting_ack = false;
    }

    /// Forget the schedule; used whenever the socket is replaced
    pub fn stop(&mut self) {
        self.interval = None;
        self.next_at = None;
        self.awaiting_ack = false;
    }

    /// When the next scheduled heartbeat is due
    pub fn next_beat(&self) -> Option<Instant> {
        self.next_at
    }

    /// A heartbeat is outstanding
    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// Record a heartbeat send
    ///
    /// Scheduled beats advance the schedule by one fixed period; out of
    /// schedule beats requested by the server leave it alone.
    pub fn sent(&mut self, scheduled: bool) {
        let now = Instant::now();
        self.awaiting_ack = true;
        self.last_sent = Some(now);

        if scheduled {
            if let (Some(interval), Some(next)) = (self.interval, self.next_at) {
                let mut following = next + interval;
                // Never schedule into the past after a long stall
                if following <= now {
                    following = now + interval;
                }
                self.next_at = Some(following);
            }
        }
    }

    /// Record an acknowledgement
    pub fn acked(&mut self) {
        let now = Instant::now();
        self.awaiting_ack = false;
        if let Some(sent) = self.last_sent {
            self.latency = Some(now.saturating_duration_since(sent));
        }
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
