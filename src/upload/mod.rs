//! Telemetry upload

mod client;
mod http;

pub use client::UploadClient;
pub use http::HttpTransport;
