//! Station configuration
//!
//! Loaded from a TOML file; every section and field falls back to a default,
//! so a minimal file only names what differs. Environment variables override
//! file values:
//! - `FIELDCAM_UPLOAD_URL`: upload endpoint
//! - `FIELDCAM_APN`: cellular access point name

use anyhow::{Context, Result};
use fieldcam_shared::{CameraPolicy, RetryPolicy, UploadPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "station.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub station: StationConfig,
    pub network: NetworkConfig,
    pub camera: CameraConfig,
    pub upload: UploadConfig,
    pub power: PowerConfig,
}

/// What to do when the camera cannot deliver a picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFailurePolicy {
    /// Upload voltage and timestamp without a picture
    #[default]
    Telemetry,
    /// Treat the cycle as fatal
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub id: u32,
    /// Hours between wake-ups, counted from midnight
    pub interval_hours: u32,
    /// Minute past the hour each wake-up lands on
    pub anchor_minute: u32,
    pub picture_every_n_cycles: u32,
    /// 0 disables the status SMS
    pub sms_every_n_cycles: u32,
    pub sms_recipient: Option<String>,
    pub voltage_in_filename: bool,
    pub on_camera_failure: CameraFailurePolicy,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: 55,
            interval_hours: 1,
            anchor_minute: 0,
            picture_every_n_cycles: 1,
            sms_every_n_cycles: 0,
            sms_recipient: None,
            voltage_in_filename: true,
            on_camera_failure: CameraFailurePolicy::Telemetry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub modem_port: String,
    pub modem_baud: u32,
    pub apn: String,
    pub command_timeout_ms: u64,
    pub attach: RetryPolicy,
    pub connect: RetryPolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            modem_port: "/dev/ttyUSB2".into(),
            modem_baud: 115_200,
            apn: "internet".into(),
            command_timeout_ms: 5000,
            attach: RetryPolicy::attach(),
            connect: RetryPolicy::connect(),
        }
    }
}

impl NetworkConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub port: String,
    pub baud: u32,
    /// sysfs value file of the trigger line
    pub trigger_gpio: PathBuf,
    pub timing: CameraPolicy,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS1".into(),
            baud: 38_400,
            trigger_gpio: PathBuf::from("/sys/class/gpio/gpio17/value"),
            timing: CameraPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    pub retry: UploadPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8555/file/base64".into(),
            request_timeout_ms: 30_000,
            retry: UploadPolicy::default(),
        }
    }
}

impl UploadConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// IIO raw channel of the battery divider
    pub adc_path: PathBuf,
    pub volts_per_count: f32,
    /// Non-volatile state image
    pub state_path: PathBuf,
    /// Supervisor sleep before the forced reset
    pub fail_safe_sleep_secs: u64,
    /// Process exit code standing in for a hardware reset
    pub reset_exit_code: i32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            adc_path: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_voltage0_raw"),
            volts_per_count: 0.004_03,
            state_path: PathBuf::from("/var/lib/fieldcam/state.pb"),
            fail_safe_sleep_secs: 3300,
            reset_exit_code: 75,
        }
    }
}

impl PowerConfig {
    pub fn fail_safe_sleep(&self) -> Duration {
        Duration::from_secs(self.fail_safe_sleep_secs)
    }
}

impl Config {
    /// Load configuration from file, apply overrides, validate
    pub fn load(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config = Self::parse(&text)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("FIELDCAM_UPLOAD_URL") {
            tracing::info!("Using FIELDCAM_UPLOAD_URL from environment");
            self.upload.url = url;
        }
        if let Ok(apn) = std::env::var("FIELDCAM_APN") {
            tracing::info!("Using FIELDCAM_APN from environment");
            self.network.apn = apn;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let station = &self.station;
        if station.interval_hours == 0 || station.interval_hours > 24 {
            anyhow::bail!(
                "Invalid interval_hours: {} (must be 1..=24)",
                station.interval_hours
            );
        }
        if station.anchor_minute > 59 {
            anyhow::bail!(
                "Invalid anchor_minute: {} (must be 0..=59)",
                station.anchor_minute
            );
        }
        if station.picture_every_n_cycles == 0 {
            anyhow::bail!("picture_every_n_cycles must be at least 1");
        }
        if station.sms_every_n_cycles > 0 && station.sms_recipient.is_none() {
            anyhow::bail!("sms_every_n_cycles is set but sms_recipient is missing");
        }

        for (name, policy) in [("attach", &self.network.attach), ("connect", &self.network.connect)] {
            if policy.max_attempts == 0 || policy.poll.max_checks == 0 {
                anyhow::bail!("network.{} needs at least one attempt and one check", name);
            }
        }

        let timing = &self.camera.timing;
        if timing.reset_cycles == 0 || timing.greeting.max_checks == 0 || timing.length.max_checks == 0
        {
            anyhow::bail!("camera.timing needs at least one reset cycle, greeting and length read");
        }

        let url = &self.upload.url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!(
                "Invalid upload URL: {} (must start with http:// or https://)",
                url
            );
        }

        let interval = Duration::from_secs(u64::from(station.interval_hours) * 3600);
        let sleep = self.power.fail_safe_sleep();
        if sleep.is_zero() || sleep >= interval {
            anyhow::bail!(
                "fail_safe_sleep_secs must be between 1 and {} (shorter than the alarm interval)",
                interval.as_secs() - 1
            );
        }

        Ok(())
    }
}
