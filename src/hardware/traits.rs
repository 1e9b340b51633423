//! Trait seams for the station's external collaborators
//!
//! The core never touches a register, a device file or a socket directly;
//! it talks to these traits, and the board wires in concrete backends.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use fieldcam_shared::StoreKey;
use std::time::Duration;

/// Point-to-point serial line to the camera module
#[async_trait]
pub trait SerialLink: Send {
    /// Write every byte of `data`
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to and including the next `\n`
    ///
    /// Returns whatever arrived if the timeout expires first, and `None` if
    /// nothing arrived at all.
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Bytes that can be read right now without waiting
    async fn available(&mut self) -> Result<usize>;

    /// Copy currently available bytes into `buf`, returning how many were copied
    ///
    /// Never copies more than `buf.len()`.
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Deinitialise the port
    async fn release(&mut self) -> Result<()>;
}

/// Open-drain line driving the camera reset/trigger input
#[async_trait]
pub trait TriggerLine: Send {
    async fn set_low(&mut self) -> Result<()>;
    async fn release(&mut self) -> Result<()>;
}

/// Real-time clock with a single alarm
pub trait Rtc: Send {
    fn now(&mut self) -> Result<NaiveDateTime>;
    fn set_alarm(&mut self, at: NaiveDateTime) -> Result<()>;
    /// Clear a latched alarm flag and any pending alarm interrupt
    fn clear_alarm_flag(&mut self) -> Result<()>;
    fn enable_alarm_interrupt(&mut self) -> Result<()>;
}

/// Cellular modem
///
/// `attach` and `connect` only issue the request; completion is observed by
/// polling `is_attached` / `is_connected`.
#[async_trait]
pub trait Modem: Send {
    async fn is_attached(&mut self) -> Result<bool>;
    async fn attach(&mut self) -> Result<()>;
    async fn is_connected(&mut self) -> Result<bool>;
    async fn connect(&mut self, apn: &str) -> Result<()>;
    async fn detach(&mut self) -> Result<()>;
    async fn soft_reset(&mut self) -> Result<()>;
    async fn send_sms(&mut self, recipient: &str, text: &str) -> Result<()>;
}

/// Battery voltage measurement
#[async_trait]
pub trait VoltageSensor: Send {
    async fn read_voltage(&mut self) -> Result<f32>;
}

/// Key/value storage that survives power loss and reset
///
/// Each `set` is a single atomic store.
pub trait NonVolatileStore: Send {
    fn get(&self, key: StoreKey) -> Result<u64>;
    fn set(&mut self, key: StoreKey, value: u64) -> Result<()>;
}

/// Power and reset control
#[async_trait]
pub trait SystemControl: Send {
    /// Low-power wait
    async fn deep_sleep(&mut self, duration: Duration);

    /// Force a hardware reset
    fn hard_reset(&mut self) -> !;
}

/// Transport used to reach the upload endpoint
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// POST a JSON body, returning the response text
    async fn post_json(&self, url: &str, body: &str) -> Result<String>;
}
