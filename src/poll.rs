//! Poll-with-deadline primitive
//!
//! Every bounded wait on the station (modem status checks, camera greetings,
//! length line reads) is a fixed number of probes a fixed interval apart.
//! `Poller` owns that loop so the timing lives in one place.

use fieldcam_shared::PollPolicy;
use tokio::time::{sleep_until, Duration, Instant};

/// Drives a fixed-interval poll loop
///
/// `next_attempt()` yields attempt numbers `1..=max_checks`, then `None`.
/// Attempt `n` starts `(n - 1) * interval` after the poller was created, so
/// time spent inside a probe does not stretch the cadence. A probe that
/// overruns its slot is followed immediately by the next one.
#[derive(Debug)]
pub struct Poller {
    policy: PollPolicy,
    attempt: u32,
    started: Instant,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            started: Instant::now(),
        }
    }

    /// Wait for the next probe slot
    pub async fn next_attempt(&mut self) -> Option<u32> {
        if self.attempt >= self.policy.max_checks {
            return None;
        }
        if self.attempt > 0 {
            sleep_until(self.started + self.policy.interval() * self.attempt).await;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    /// Probes handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn max_checks(&self) -> u32 {
        self.policy.max_checks
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
