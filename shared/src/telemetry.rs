//! Telemetry record uploaded at the end of a wake cycle

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Format a clock reading the way the upload endpoint expects it
pub fn iso8601(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// One station report, built once and consumed by a single upload
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    station_id: u32,
    voltage: f32,
    timestamp: String,
    base64_payload: Option<String>,
}

impl TelemetryRecord {
    /// Report carrying a picture
    pub fn picture(station_id: u32, voltage: f32, taken_at: NaiveDateTime, payload: &[u8]) -> Self {
        Self {
            station_id,
            voltage,
            timestamp: iso8601(taken_at),
            base64_payload: Some(STANDARD.encode(payload)),
        }
    }

    /// Report without a picture
    pub fn telemetry_only(station_id: u32, voltage: f32, taken_at: NaiveDateTime) -> Self {
        Self {
            station_id,
            voltage,
            timestamp: iso8601(taken_at),
            base64_payload: None,
        }
    }

    pub fn station_id(&self) -> u32 {
        self.station_id
    }

    pub fn voltage(&self) -> f32 {
        self.voltage
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn base64_payload(&self) -> Option<&str> {
        self.base64_payload.as_deref()
    }

    pub fn has_picture(&self) -> bool {
        self.base64_payload.is_some()
    }

    /// JSON request body
    ///
    /// `voltage` is only reported alongside a picture.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let body = UploadBody {
            voltage: self
                .base64_payload
                .as_ref()
                .map(|_| (f64::from(self.voltage) * 100.0).round() / 100.0),
            base64_file: self.base64_payload.as_deref(),
            id: self.station_id,
            time_stamp: &self.timestamp,
        };
        serde_json::to_string(&body)
    }
}

#[derive(Serialize)]
struct UploadBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    voltage: Option<f64>,
    #[serde(rename = "base64File", skip_serializing_if = "Option::is_none")]
    base64_file: Option<&'a str>,
    id: u32,
    #[serde(rename = "timeStamp")]
    time_stamp: &'a str,
}

/// Whatever the endpoint answered; logged, never interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAck {
    pub body: String,
}
