//! Upload with one bounded retry

use crate::hardware::UploadTransport;
use fieldcam_shared::{ServerAck, TelemetryRecord, UploadPolicy};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to encode upload body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Upload failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

pub struct UploadClient<'a> {
    transport: &'a dyn UploadTransport,
    url: &'a str,
    policy: UploadPolicy,
}

impl<'a> UploadClient<'a> {
    pub fn new(transport: &'a dyn UploadTransport, url: &'a str, policy: UploadPolicy) -> Self {
        Self {
            transport,
            url,
            policy,
        }
    }

    /// Send one record
    ///
    /// The body is built once; a transport error is retried after the policy
    /// delay until the attempts run out. Nothing is kept for later.
    pub async fn upload(&self, record: TelemetryRecord) -> Result<ServerAck, UploadError> {
        let body = record.to_json()?;
        let attempts = self.policy.attempts();
        info!(
            "[UPLOAD] Station {} at {}: {} bytes{}",
            record.station_id(),
            record.timestamp(),
            body.len(),
            if record.has_picture() { " with picture" } else { "" }
        );

        let mut last = String::new();
        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.policy.retry_delay()).await;
            }

            match self.transport.post_json(self.url, &body).await {
                Ok(text) => {
                    info!("[UPLOAD] Server replied: {}", text.trim());
                    return Ok(ServerAck { body: text });
                }
                Err(e) => {
                    warn!("[UPLOAD] Attempt {}/{} failed: {:#}", attempt, attempts, e);
                    last = format!("{:#}", e);
                }
            }
        }

        Err(UploadError::Exhausted { attempts, last })
    }
}
