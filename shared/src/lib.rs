//! Field camera station shared types
//!
//! This crate holds the hardware-free half of the station: the camera link
//! codec, the session state machines, alarm schedule arithmetic, the
//! persisted-state image and the telemetry record sent upstream.

pub mod codec;
pub mod persist;
pub mod policy;
pub mod schedule;
pub mod state_machine;
pub mod telemetry;

pub use codec::{CaptureName, CodecError, PictureTransfer};
pub use persist::{CycleKind, CyclePlan, PersistedRecord, StoreKey, WakeCause, WakeContext};
pub use policy::{CameraPolicy, PollPolicy, RetryPolicy, UploadPolicy};
pub use schedule::{AlarmSchedule, ScheduleError};
pub use state_machine::{
    CameraEvent, CameraSession, CameraState, NetworkEvent, NetworkSession, NetworkState,
    TransitionResult,
};
pub use telemetry::{ServerAck, TelemetryRecord};

/// Default timing and retry parameters for the station
pub mod defaults {
    /// Outer attach attempts before giving up on the carrier
    pub const ATTACH_ATTEMPTS: u32 = 5;

    /// Attach status checks per attempt
    pub const ATTACH_CHECKS: u32 = 15;

    /// Delay between attach status checks
    pub const ATTACH_POLL_MS: u64 = 2000;

    /// Outer data-session attempts
    pub const CONNECT_ATTEMPTS: u32 = 5;

    /// Data-session status checks per attempt
    pub const CONNECT_CHECKS: u32 = 10;

    /// Delay between data-session status checks
    pub const CONNECT_POLL_MS: u64 = 1000;

    /// Width of the low pulse on the camera trigger line
    pub const TRIGGER_PULSE_MS: u64 = 10;

    /// Time the camera needs after the trigger before it listens
    pub const CAMERA_BOOT_MS: u64 = 1000;

    /// Greetings sent per reset cycle
    pub const GREETING_ATTEMPTS: u32 = 50;

    /// Interval between greetings
    pub const GREETING_INTERVAL_MS: u64 = 200;

    /// How long to wait for a reply line after each greeting
    pub const REPLY_TIMEOUT_MS: u64 = 100;

    /// Full trigger/handshake cycles before the camera is declared failed
    pub const CAMERA_RESET_CYCLES: u32 = 3;

    /// Pause between the ready token and the filename
    pub const SETTLE_DELAY_MS: u64 = 200;

    /// Length line reads before the negotiation is abandoned
    pub const LENGTH_ATTEMPTS: u32 = 50;

    /// Interval between length line reads
    pub const LENGTH_INTERVAL_MS: u64 = 100;

    /// Idle wait while the payload is still in flight
    pub const PAYLOAD_POLL_MS: u64 = 5;

    /// Upload retries after the first request
    pub const UPLOAD_RETRIES: u32 = 1;

    /// Delay before the upload retry
    pub const UPLOAD_RETRY_DELAY_MS: u64 = 5000;
}
