//! Host power and reset control

use crate::hardware::traits::SystemControl;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info};

/// Sleep is a timer; reset is a process exit the service manager restarts
pub struct HostSystem {
    reset_exit_code: i32,
}

impl HostSystem {
    pub fn new(reset_exit_code: i32) -> Self {
        Self { reset_exit_code }
    }
}

#[async_trait]
impl SystemControl for HostSystem {
    async fn deep_sleep(&mut self, duration: Duration) {
        info!("[POWER] Sleeping for {:?}", duration);
        tokio::time::sleep(duration).await;
    }

    fn hard_reset(&mut self) -> ! {
        error!("[POWER] Hard reset (exit {})", self.reset_exit_code);
        std::process::exit(self.reset_exit_code)
    }
}
