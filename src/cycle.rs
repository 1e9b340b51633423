//! One wake cycle, start to reset
//!
//! Order is fixed: clock and alarm first, then persisted state, battery,
//! network, picture, upload. Only the alarm, the network and (by policy) the
//! camera can end a cycle early; everything else degrades and carries on.

use crate::camera::{CameraError, CameraTransferProtocol};
use crate::config::{CameraFailurePolicy, Config};
use crate::hardware::Board;
use crate::network::{NetworkError, NetworkManager};
use crate::scheduler::{AlarmScheduler, SchedulerError};
use crate::state::PersistedState;
use crate::supervisor::{ShutdownReason, ShutdownSupervisor};
use crate::upload::UploadClient;
use fieldcam_shared::{
    AlarmSchedule, CaptureName, CycleKind, CyclePlan, TelemetryRecord, WakeContext,
};
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, info, warn};

/// Failures that end a cycle early
#[derive(Error, Debug)]
pub enum FatalError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Camera(#[from] CameraError),
}

#[derive(Debug)]
pub struct CycleReport {
    pub schedule: AlarmSchedule,
    pub wake: WakeContext,
    pub plan: CyclePlan,
    /// `None` when the battery could not be read
    pub voltage: Option<f32>,
    pub picture_bytes: Option<usize>,
    pub uploaded: bool,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Fatal(FatalError),
}

impl CycleOutcome {
    pub fn shutdown_reason(&self) -> ShutdownReason {
        match self {
            CycleOutcome::Completed(_) => ShutdownReason::CycleComplete,
            CycleOutcome::Fatal(e) => ShutdownReason::Fatal(e.to_string()),
        }
    }
}

pub struct WakeCycle<'a> {
    board: &'a mut Board,
    config: &'a Config,
}

impl<'a> WakeCycle<'a> {
    pub fn new(board: &'a mut Board, config: &'a Config) -> Self {
        Self { board, config }
    }

    pub async fn run(&mut self) -> CycleOutcome {
        match self.execute().await {
            Ok(report) => {
                info!(
                    "[CYCLE] Done: counter {}, {:?}, picture {:?} bytes, uploaded {}",
                    report.wake.interval_counter,
                    report.plan.kind,
                    report.picture_bytes,
                    report.uploaded
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                error!("[CYCLE] Aborted: {}", e);
                CycleOutcome::Fatal(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<CycleReport, FatalError> {
        let config = self.config;
        let station = &config.station;
        let Board {
            rtc,
            store,
            battery,
            modem,
            camera_trigger,
            camera_link,
            uplink,
            ..
        } = &mut *self.board;

        let mut scheduler =
            AlarmScheduler::new(&mut **rtc, station.interval_hours, station.anchor_minute);
        let now = scheduler.read_clock()?;
        let schedule = scheduler.compute_and_arm_next_alarm(now)?;

        let wake = PersistedState::new(&mut **store)
            .begin_cycle(now)
            .unwrap_or_else(|e| {
                warn!("[CYCLE] Persisted state unavailable ({}), assuming cold boot", e);
                WakeContext::fallback(now)
            });
        let plan = wake.plan(station.picture_every_n_cycles, station.sms_every_n_cycles);
        info!(
            "[CYCLE] Woke at {} ({:?}), plan {:?}",
            now, wake.wake_cause, plan
        );

        let voltage = match battery.read_voltage().await {
            Ok(volts) => Some(volts),
            Err(e) => {
                warn!("[CYCLE] Battery read failed: {}", e);
                None
            }
        };
        let reported_voltage = voltage.unwrap_or(0.0);

        let mut network = NetworkManager::new(&mut **modem, &config.network);
        network.attach().await?;
        if plan.send_status_sms {
            if let Some(recipient) = &station.sms_recipient {
                let text = format!(
                    "Station {} cycle {} battery {:.2} V",
                    station.id, wake.interval_counter, reported_voltage
                );
                network.send_status_sms(recipient, &text).await?;
            }
        }
        network.connect_data().await?;

        let mut picture = None;
        if plan.kind == CycleKind::Picture {
            let mut name = CaptureName::new(station.id, now);
            if let (true, Some(volts)) = (station.voltage_in_filename, voltage) {
                name = name.with_voltage(volts);
            }

            let mut camera = CameraTransferProtocol::new(
                &mut **camera_link,
                &mut **camera_trigger,
                &config.camera.timing,
            );
            match camera.capture(&name).await {
                Ok(payload) => picture = Some(payload),
                Err(e) => match station.on_camera_failure {
                    CameraFailurePolicy::Telemetry => {
                        warn!("[CYCLE] No picture ({}), sending telemetry only", e);
                    }
                    CameraFailurePolicy::Shutdown => return Err(e.into()),
                },
            }
        }

        let record = match &picture {
            Some(payload) => TelemetryRecord::picture(station.id, reported_voltage, now, payload),
            None => TelemetryRecord::telemetry_only(station.id, reported_voltage, now),
        };
        let client = UploadClient::new(&**uplink, &config.upload.url, config.upload.retry);
        let uploaded = match client.upload(record).await {
            Ok(_) => true,
            Err(e) => {
                warn!("[CYCLE] Upload dropped: {}", e);
                false
            }
        };

        Ok(CycleReport {
            schedule,
            wake,
            plan,
            voltage,
            picture_bytes: picture.as_ref().map(|p| p.len()),
            uploaded,
        })
    }
}

/// Run a cycle, then hand over to the supervisor; never returns
pub async fn run_until_reset(board: &mut Board, config: &Config) -> Infallible {
    let outcome = WakeCycle::new(board, config).run().await;

    ShutdownSupervisor::new(
        &mut *board.camera_link,
        &mut *board.system,
        config.power.fail_safe_sleep(),
    )
    .enter_fail_safe_sleep(outcome.shutdown_reason())
    .await
}
