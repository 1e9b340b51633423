//! reqwest-backed upload transport

use crate::hardware::UploadTransport;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &str) -> Result<String> {
        debug!("[UPLOAD] POST {} ({} bytes)", url, body.len());

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read upload response")?;

        if !status.is_success() {
            bail!("Upload rejected with status {}: {}", status, text);
        }
        Ok(text)
    }
}
