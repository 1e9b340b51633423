//! Alarm scheduling and the alarm interrupt path
//!
//! The next wake-up is armed before anything else in a cycle, so however the
//! rest of the cycle ends the station still comes back on its grid.

use crate::hardware::traits::{NonVolatileStore, Rtc, SystemControl};
use crate::state::PersistedState;
use chrono::NaiveDateTime;
use fieldcam_shared::{AlarmSchedule, ScheduleError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("RTC unreadable: {0}")]
    ClockUnreadable(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Failed to program alarm for {at}: {reason}")]
    Program { at: NaiveDateTime, reason: String },
}

/// Raised when the RTC alarm line fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEvent {
    pub fired_at: NaiveDateTime,
}

pub type AlarmSender = mpsc::Sender<AlarmEvent>;
pub type AlarmReceiver = mpsc::Receiver<AlarmEvent>;

/// Alarm notification channel
///
/// One slot: the interrupt is level-like, a second firing before the first
/// is handled carries no extra information.
pub fn alarm_channel() -> (AlarmSender, AlarmReceiver) {
    mpsc::channel(1)
}

pub struct AlarmScheduler<'a> {
    rtc: &'a mut dyn Rtc,
    interval_hours: u32,
    anchor_minute: u32,
}

impl<'a> AlarmScheduler<'a> {
    pub fn new(rtc: &'a mut dyn Rtc, interval_hours: u32, anchor_minute: u32) -> Self {
        Self {
            rtc,
            interval_hours,
            anchor_minute,
        }
    }

    pub fn read_clock(&mut self) -> Result<NaiveDateTime, SchedulerError> {
        self.rtc
            .now()
            .map_err(|e| SchedulerError::ClockUnreadable(e.to_string()))
    }

    /// Program the RTC for the next grid slot after `current`
    ///
    /// Order matters: the alarm time is written, any latched flag cleared,
    /// and only then is the interrupt enabled.
    pub fn compute_and_arm_next_alarm(
        &mut self,
        current: NaiveDateTime,
    ) -> Result<AlarmSchedule, SchedulerError> {
        let schedule = AlarmSchedule::compute(current, self.interval_hours, self.anchor_minute)?;
        let at = schedule.next_fire_time;
        let program = |e: anyhow::Error| SchedulerError::Program {
            at,
            reason: e.to_string(),
        };

        self.rtc.set_alarm(at).map_err(program)?;
        self.rtc.clear_alarm_flag().map_err(program)?;
        self.rtc.enable_alarm_interrupt().map_err(program)?;

        info!(
            "[RTC] Next alarm at {} (every {}h at :{:02})",
            at, self.interval_hours, self.anchor_minute
        );
        Ok(schedule)
    }
}

/// Handle an alarm firing: mark the wake as alarm-caused and reset
///
/// Whatever the cycle was doing is abandoned. A failed flag write is logged
/// and the reset still happens; the next boot then counts as an ordinary one.
pub fn on_alarm_interrupt(
    event: AlarmEvent,
    store: &mut dyn NonVolatileStore,
    system: &mut dyn SystemControl,
) -> ! {
    warn!("[RTC] Alarm fired at {}, resetting", event.fired_at);
    if let Err(e) = PersistedState::new(store).record_alarm_wake() {
        error!("[RTC] Failed to persist wake flag: {}", e);
    }
    system.hard_reset()
}
