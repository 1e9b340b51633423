//! Host real-time clock
//!
//! Time comes from the system clock. The alarm is a timer task that
//! publishes an `AlarmEvent` on the single-slot alarm channel, standing in
//! for the RTC interrupt line.

use crate::hardware::traits::Rtc;
use crate::scheduler::{AlarmEvent, AlarmSender};
use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use tokio::task::JoinHandle;
use tracing::debug;

pub struct SystemRtc {
    alarm: Option<NaiveDateTime>,
    alarm_tx: AlarmSender,
    pending: Option<JoinHandle<()>>,
}

impl SystemRtc {
    pub fn new(alarm_tx: AlarmSender) -> Self {
        Self {
            alarm: None,
            alarm_tx,
            pending: None,
        }
    }
}

impl Rtc for SystemRtc {
    fn now(&mut self) -> Result<NaiveDateTime> {
        Ok(Local::now().naive_local())
    }

    fn set_alarm(&mut self, at: NaiveDateTime) -> Result<()> {
        self.alarm = Some(at);
        Ok(())
    }

    fn clear_alarm_flag(&mut self) -> Result<()> {
        if let Some(task) = self.pending.take() {
            task.abort();
            debug!("[RTC] Cleared pending alarm");
        }
        Ok(())
    }

    fn enable_alarm_interrupt(&mut self) -> Result<()> {
        let at = self
            .alarm
            .ok_or_else(|| anyhow!("No alarm programmed"))?;
        self.clear_alarm_flag()?;

        let wait = (at - Local::now().naive_local()).to_std().unwrap_or_default();
        let alarm_tx = self.alarm_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // Single slot: a second event while one is pending adds nothing
            let _ = alarm_tx.try_send(AlarmEvent { fired_at: at });
        }));
        Ok(())
    }
}
