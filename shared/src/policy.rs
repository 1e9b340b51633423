//! Retry and polling policies
//!
//! Every bounded loop on the station is described by one of these structs,
//! so the numbers live in configuration instead of the control flow.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-interval poll: up to `max_checks` probes, `interval_ms` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_checks: u32,
    pub interval_ms: u64,
}

impl PollPolicy {
    pub const fn new(max_checks: u32, interval_ms: u64) -> Self {
        Self {
            max_checks,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Worst-case time spent sleeping between probes
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_checks.saturating_sub(1)
    }
}

/// Outer attempts, each wrapping an inner status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub poll: PollPolicy,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, poll: PollPolicy) -> Self {
        Self { max_attempts, poll }
    }

    /// Carrier attach defaults
    pub const fn attach() -> Self {
        Self::new(
            defaults::ATTACH_ATTEMPTS,
            PollPolicy::new(defaults::ATTACH_CHECKS, defaults::ATTACH_POLL_MS),
        )
    }

    /// Data session defaults
    pub const fn connect() -> Self {
        Self::new(
            defaults::CONNECT_ATTEMPTS,
            PollPolicy::new(defaults::CONNECT_CHECKS, defaults::CONNECT_POLL_MS),
        )
    }
}

/// Timing of the camera handshake and transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPolicy {
    pub trigger_pulse_ms: u64,
    pub boot_delay_ms: u64,
    pub greeting: PollPolicy,
    pub reply_timeout_ms: u64,
    pub reset_cycles: u32,
    pub settle_delay_ms: u64,
    pub length: PollPolicy,
    pub payload_poll_ms: u64,
}

impl Default for CameraPolicy {
    fn default() -> Self {
        Self {
            trigger_pulse_ms: defaults::TRIGGER_PULSE_MS,
            boot_delay_ms: defaults::CAMERA_BOOT_MS,
            greeting: PollPolicy::new(defaults::GREETING_ATTEMPTS, defaults::GREETING_INTERVAL_MS),
            reply_timeout_ms: defaults::REPLY_TIMEOUT_MS,
            reset_cycles: defaults::CAMERA_RESET_CYCLES,
            settle_delay_ms: defaults::SETTLE_DELAY_MS,
            length: PollPolicy::new(defaults::LENGTH_ATTEMPTS, defaults::LENGTH_INTERVAL_MS),
            payload_poll_ms: defaults::PAYLOAD_POLL_MS,
        }
    }
}

impl CameraPolicy {
    pub fn trigger_pulse(&self) -> Duration {
        Duration::from_millis(self.trigger_pulse_ms)
    }

    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.boot_delay_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn payload_poll(&self) -> Duration {
        Duration::from_millis(self.payload_poll_ms)
    }
}

/// Upload retry behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            retries: defaults::UPLOAD_RETRIES,
            retry_delay_ms: defaults::UPLOAD_RETRY_DELAY_MS,
        }
    }
}

impl UploadPolicy {
    /// Total requests including the first one
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
