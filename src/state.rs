//! Wake flag and interval counter across resets

use crate::hardware::traits::NonVolatileStore;
use anyhow::Result;
use chrono::NaiveDateTime;
use fieldcam_shared::{StoreKey, WakeCause, WakeContext};
use tracing::{debug, info};

pub struct PersistedState<'a> {
    store: &'a mut dyn NonVolatileStore,
}

impl<'a> PersistedState<'a> {
    pub fn new(store: &'a mut dyn NonVolatileStore) -> Self {
        Self { store }
    }

    /// Read and advance the persisted state at boot
    ///
    /// A set wake flag is cleared here, and the interval counter advanced
    /// (wrapping) for the next boot. The returned context carries the counter
    /// as it was read.
    pub fn begin_cycle(&mut self, now: NaiveDateTime) -> Result<WakeContext> {
        let flag = self.store.get(StoreKey::WakeFlag)?;
        let counter = self.store.get(StoreKey::IntervalCounter)?;

        let wake_cause = if flag != 0 {
            self.store.set(StoreKey::WakeFlag, 0)?;
            WakeCause::AlarmTriggered
        } else {
            WakeCause::OtherReset
        };
        self.store
            .set(StoreKey::IntervalCounter, counter.wrapping_add(1))?;

        info!(
            "[STATE] Wake {:?}, interval counter {}",
            wake_cause, counter
        );
        Ok(WakeContext {
            wake_timestamp: now,
            wake_cause,
            interval_counter: counter,
        })
    }

    /// Mark the next boot as alarm-caused
    pub fn record_alarm_wake(&mut self) -> Result<()> {
        debug!("[STATE] Setting wake flag");
        self.store.set(StoreKey::WakeFlag, 1)
    }
}
