//! Shutdown supervisor
//!
//! Every cycle ends here, successful or not. The sleep is shorter than the
//! alarm interval, so if the alarm never fires the forced reset still does.

use crate::hardware::{SerialLink, SystemControl};
use std::convert::Infallible;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why the station is going down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    CycleComplete,
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::CycleComplete => write!(f, "cycle complete"),
            ShutdownReason::Fatal(reason) => write!(f, "fatal: {}", reason),
        }
    }
}

pub struct ShutdownSupervisor<'a> {
    camera_link: &'a mut dyn SerialLink,
    system: &'a mut dyn SystemControl,
    fail_safe_sleep: Duration,
}

impl<'a> ShutdownSupervisor<'a> {
    pub fn new(
        camera_link: &'a mut dyn SerialLink,
        system: &'a mut dyn SystemControl,
        fail_safe_sleep: Duration,
    ) -> Self {
        Self {
            camera_link,
            system,
            fail_safe_sleep,
        }
    }

    /// Release the camera link, sleep, then force a reset
    ///
    /// The network attachment is left as it is.
    pub async fn enter_fail_safe_sleep(mut self, reason: ShutdownReason) -> Infallible {
        match &reason {
            ShutdownReason::CycleComplete => info!("[SUPERVISOR] Shutting down: {}", reason),
            ShutdownReason::Fatal(_) => error!("[SUPERVISOR] Shutting down: {}", reason),
        }

        if let Err(e) = self.camera_link.release().await {
            warn!("[SUPERVISOR] Failed to release camera link: {}", e);
        }

        info!(
            "[SUPERVISOR] Fail-safe sleep for {:?}, then reset",
            self.fail_safe_sleep
        );
        self.system.deep_sleep(self.fail_safe_sleep).await;
        self.system.hard_reset()
    }
}
