//! Non-volatile state that survives resets
//!
//! The store holds two keys: the wake-cause flag written by the alarm
//! interrupt, and the interval counter advanced once per boot. On disk (or
//! flash) they are kept together as one protobuf message so every write
//! replaces the whole image in a single store.

use bytes::{Bytes, BytesMut};
use chrono::NaiveDateTime;
use prost::Message;

/// Keys of the non-volatile store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    /// 1 when the last reset was forced by the RTC alarm
    WakeFlag,
    /// Wake cycles started since the store was created
    IntervalCounter,
}

/// Persisted image of the store
#[derive(Clone, PartialEq, Message)]
pub struct PersistedRecord {
    #[prost(uint64, tag = "1")]
    pub wake_flag: u64,

    #[prost(uint64, tag = "2")]
    pub interval_counter: u64,
}

impl PersistedRecord {
    pub fn get(&self, key: StoreKey) -> u64 {
        match key {
            StoreKey::WakeFlag => self.wake_flag,
            StoreKey::IntervalCounter => self.interval_counter,
        }
    }

    pub fn set(&mut self, key: StoreKey, value: u64) {
        match key {
            StoreKey::WakeFlag => self.wake_flag = value,
            StoreKey::IntervalCounter => self.interval_counter = value,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        // Encoding into a buffer reserved to encoded_len() cannot run out of space
        let _ = self.encode(&mut buf);
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}

/// Why this boot happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    AlarmTriggered,
    OtherReset,
}

/// Per-boot context derived from the persisted state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeContext {
    pub wake_timestamp: NaiveDateTime,
    pub wake_cause: WakeCause,
    /// Counter value read at boot, before it was advanced
    pub interval_counter: u64,
}

/// Kind of work a wake cycle does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Picture,
    TelemetryOnly,
}

/// Decisions taken from the interval counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePlan {
    pub kind: CycleKind,
    pub send_status_sms: bool,
}

impl WakeContext {
    /// Context used when the store could not be read
    pub fn fallback(wake_timestamp: NaiveDateTime) -> Self {
        Self {
            wake_timestamp,
            wake_cause: WakeCause::OtherReset,
            interval_counter: 0,
        }
    }

    /// Pick the cycle kind and SMS cadence
    ///
    /// `picture_every` of 0 or 1 takes a picture every cycle; `sms_every` of 0
    /// never sends a status SMS.
    pub fn plan(&self, picture_every: u32, sms_every: u32) -> CyclePlan {
        let counter = self.interval_counter;
        let kind = if picture_every <= 1 || counter % u64::from(picture_every) == 0 {
            CycleKind::Picture
        } else {
            CycleKind::TelemetryOnly
        };
        let send_status_sms = sms_every > 0 && counter % u64::from(sms_every) == 0;

        CyclePlan {
            kind,
            send_status_sms,
        }
    }
}
