//! Scripted collaborators for tests
//!
//! Every mock is `Clone` and keeps its state behind `Arc<Mutex<..>>`, so a
//! test keeps one handle for assertions while the boxed copy lives in the
//! `Board`.

use super::traits::{
    Modem, NonVolatileStore, Rtc, SerialLink, SystemControl, TriggerLine, UploadTransport,
    VoltageSensor,
};
use super::Board;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use fieldcam_shared::{PersistedRecord, StoreKey};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------- serial

/// Outcome of one scripted `read_line`
#[derive(Debug)]
pub enum Reply {
    Line(Vec<u8>),
    /// Nothing arrives before the timeout
    Silence,
    /// The read fails with an I/O error
    Fault,
}

#[derive(Debug, Default)]
pub struct SerialScript {
    /// Results of `read_line`; an exhausted script reads as silence
    pub replies: VecDeque<Reply>,
    /// Writes that fail before any succeeds
    pub write_failures: u32,
    /// Payload deliveries; an empty chunk is one poll with nothing available
    pub chunks: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub read_calls: usize,
    pub largest_read: usize,
    pub released: bool,
}

#[derive(Clone, Default)]
pub struct MockSerial {
    script: Arc<Mutex<SerialScript>>,
}

impl MockSerial {
    pub fn reply(&self, line: &[u8]) -> &Self {
        self.script.lock().unwrap().replies.push_back(Reply::Line(line.to_vec()));
        self
    }

    pub fn silence(&self) -> &Self {
        self.script.lock().unwrap().replies.push_back(Reply::Silence);
        self
    }

    pub fn fault(&self) -> &Self {
        self.script.lock().unwrap().replies.push_back(Reply::Fault);
        self
    }

    pub fn fail_writes(&self, count: u32) -> &Self {
        self.script.lock().unwrap().write_failures = count;
        self
    }

    pub fn chunk(&self, data: Vec<u8>) -> &Self {
        self.script.lock().unwrap().chunks.push_back(data);
        self
    }

    /// Queue `payload` split at the given sizes
    pub fn chunks(&self, payload: &[u8], sizes: &[usize]) -> &Self {
        let mut offset = 0;
        for size in sizes {
            self.chunk(payload[offset..offset + size].to_vec());
            offset += size;
        }
        self
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().written.clone()
    }

    pub fn largest_read(&self) -> usize {
        self.script.lock().unwrap().largest_read
    }

    pub fn released(&self) -> bool {
        self.script.lock().unwrap().released
    }
}

#[async_trait]
impl SerialLink for MockSerial {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.write_failures > 0 {
            script.write_failures -= 1;
            bail!("UART framing error");
        }
        script.written.push(data.to_vec());
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let next = self.script.lock().unwrap().replies.pop_front();
        match next {
            Some(Reply::Line(line)) => Ok(Some(line)),
            Some(Reply::Fault) => Err(anyhow!("UART overrun")),
            Some(Reply::Silence) | None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn available(&mut self) -> Result<usize> {
        let mut script = self.script.lock().unwrap();
        match script.chunks.front().map(Vec::len) {
            Some(0) => {
                script.chunks.pop_front();
                Ok(0)
            }
            Some(len) => Ok(len),
            None => Ok(0),
        }
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut script = self.script.lock().unwrap();
        script.read_calls += 1;
        let Some(chunk) = script.chunks.front_mut() else {
            return Ok(0);
        };
        let count = buf.len().min(chunk.len());
        buf[..count].copy_from_slice(&chunk[..count]);
        chunk.drain(..count);
        if chunk.is_empty() {
            script.chunks.pop_front();
        }
        script.largest_read = script.largest_read.max(count);
        Ok(count)
    }

    async fn release(&mut self) -> Result<()> {
        self.script.lock().unwrap().released = true;
        Ok(())
    }
}

// ---------------------------------------------------------------- trigger

#[derive(Clone, Default)]
pub struct MockTrigger {
    levels: Arc<Mutex<Vec<&'static str>>>,
}

impl MockTrigger {
    /// Completed low pulses
    pub fn pulses(&self) -> usize {
        self.levels
            .lock()
            .unwrap()
            .windows(2)
            .filter(|w| w[0] == "low" && w[1] == "release")
            .count()
    }
}

#[async_trait]
impl TriggerLine for MockTrigger {
    async fn set_low(&mut self) -> Result<()> {
        self.levels.lock().unwrap().push("low");
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        self.levels.lock().unwrap().push("release");
        Ok(())
    }
}

// ---------------------------------------------------------------- rtc

#[derive(Clone)]
pub struct MockRtc {
    now: Option<NaiveDateTime>,
    alarm: Arc<Mutex<Option<NaiveDateTime>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl MockRtc {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Some(now),
            alarm: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn broken() -> Self {
        Self {
            now: None,
            alarm: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<&'static str>>> {
        self.calls.clone()
    }

    pub fn armed(&self) -> Option<NaiveDateTime> {
        *self.alarm.lock().unwrap()
    }
}

impl Rtc for MockRtc {
    fn now(&mut self) -> Result<NaiveDateTime> {
        self.now.ok_or_else(|| anyhow!("I2C NACK from RTC"))
    }

    fn set_alarm(&mut self, at: NaiveDateTime) -> Result<()> {
        *self.alarm.lock().unwrap() = Some(at);
        self.calls.lock().unwrap().push("set_alarm");
        Ok(())
    }

    fn clear_alarm_flag(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("clear_alarm_flag");
        Ok(())
    }

    fn enable_alarm_interrupt(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("enable_alarm_interrupt");
        Ok(())
    }
}

// ---------------------------------------------------------------- modem

#[derive(Debug, Default)]
pub struct ModemScript {
    pub attached: bool,
    pub connected: bool,
    /// Attached once `attach` was called this many times and then polled this often
    pub attach_ready_at: Option<(u32, u32)>,
    pub connect_ready_at: Option<(u32, u32)>,
    pub attach_calls: u32,
    pub connect_calls: u32,
    pub polls_since_attach: u32,
    pub polls_since_connect: u32,
    /// Status polls that fail with an I/O error before any succeeds
    pub poll_errors: u32,
    pub soft_resets: u32,
    pub detach_calls: u32,
    pub sms: Vec<(String, String)>,
}

#[derive(Clone, Default)]
pub struct MockModem {
    script: Arc<Mutex<ModemScript>>,
}

impl MockModem {
    /// Attaches and connects on the first poll after each request
    pub fn online() -> Self {
        let modem = Self::default();
        {
            let mut s = modem.script.lock().unwrap();
            s.attach_ready_at = Some((1, 1));
            s.connect_ready_at = Some((1, 1));
        }
        modem
    }

    pub fn script(&self) -> std::sync::MutexGuard<'_, ModemScript> {
        self.script.lock().unwrap()
    }

    fn poll_error(s: &mut ModemScript) -> Result<()> {
        if s.poll_errors > 0 {
            s.poll_errors -= 1;
            bail!("serial timeout talking to modem");
        }
        Ok(())
    }
}

fn reached(ready_at: Option<(u32, u32)>, calls: u32, polls: u32) -> bool {
    matches!(ready_at, Some((c, p)) if calls >= c && polls >= p)
}

#[async_trait]
impl Modem for MockModem {
    async fn is_attached(&mut self) -> Result<bool> {
        let mut s = self.script.lock().unwrap();
        Self::poll_error(&mut s)?;
        s.polls_since_attach += 1;
        if !s.attached && reached(s.attach_ready_at, s.attach_calls, s.polls_since_attach) {
            s.attached = true;
        }
        Ok(s.attached)
    }

    async fn attach(&mut self) -> Result<()> {
        let mut s = self.script.lock().unwrap();
        s.attach_calls += 1;
        s.polls_since_attach = 0;
        Ok(())
    }

    async fn is_connected(&mut self) -> Result<bool> {
        let mut s = self.script.lock().unwrap();
        Self::poll_error(&mut s)?;
        s.polls_since_connect += 1;
        if s.attached
            && !s.connected
            && reached(s.connect_ready_at, s.connect_calls, s.polls_since_connect)
        {
            s.connected = true;
        }
        Ok(s.connected)
    }

    async fn connect(&mut self, _apn: &str) -> Result<()> {
        let mut s = self.script.lock().unwrap();
        s.connect_calls += 1;
        s.polls_since_connect = 0;
        Ok(())
    }

    async fn detach(&mut self) -> Result<()> {
        let mut s = self.script.lock().unwrap();
        s.detach_calls += 1;
        s.attached = false;
        s.connected = false;
        Ok(())
    }

    async fn soft_reset(&mut self) -> Result<()> {
        let mut s = self.script.lock().unwrap();
        s.soft_resets += 1;
        s.attached = false;
        s.connected = false;
        Ok(())
    }

    async fn send_sms(&mut self, recipient: &str, text: &str) -> Result<()> {
        self.script
            .lock()
            .unwrap()
            .sms
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------- battery

#[derive(Clone)]
pub struct MockBattery {
    volts: Option<f32>,
}

impl MockBattery {
    pub fn reading(volts: f32) -> Self {
        Self { volts: Some(volts) }
    }

    pub fn broken() -> Self {
        Self { volts: None }
    }
}

#[async_trait]
impl VoltageSensor for MockBattery {
    async fn read_voltage(&mut self) -> Result<f32> {
        self.volts.ok_or_else(|| anyhow!("ADC not ready"))
    }
}

// ---------------------------------------------------------------- store

#[derive(Clone, Default)]
pub struct MockStore {
    values: Arc<Mutex<PersistedRecord>>,
    failing: bool,
}

impl MockStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn values(&self) -> Arc<Mutex<PersistedRecord>> {
        self.values.clone()
    }
}

impl NonVolatileStore for MockStore {
    fn get(&self, key: StoreKey) -> Result<u64> {
        if self.failing {
            bail!("flash read failed");
        }
        Ok(self.values.lock().unwrap().get(key))
    }

    fn set(&mut self, key: StoreKey, value: u64) -> Result<()> {
        if self.failing {
            bail!("flash write failed");
        }
        self.values.lock().unwrap().set(key, value);
        Ok(())
    }
}

// ---------------------------------------------------------------- system

#[derive(Clone, Default)]
pub struct MockSystem {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl MockSystem {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl SystemControl for MockSystem {
    async fn deep_sleep(&mut self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::time::sleep(duration).await;
    }

    fn hard_reset(&mut self) -> ! {
        panic!("hard reset");
    }
}

// ---------------------------------------------------------------- uplink

#[derive(Debug, Default)]
pub struct UplinkScript {
    pub failures_remaining: u32,
    pub bodies: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockUplink {
    script: Arc<Mutex<UplinkScript>>,
}

impl MockUplink {
    pub fn failing(times: u32) -> Self {
        let uplink = Self::default();
        uplink.script.lock().unwrap().failures_remaining = times;
        uplink
    }

    pub fn bodies(&self) -> Vec<String> {
        self.script.lock().unwrap().bodies.clone()
    }
}

#[async_trait]
impl UploadTransport for MockUplink {
    async fn post_json(&self, _url: &str, body: &str) -> Result<String> {
        let mut s = self.script.lock().unwrap();
        s.bodies.push(body.to_string());
        if s.failures_remaining > 0 {
            s.failures_remaining -= 1;
            bail!("connection reset by peer");
        }
        Ok("ok".to_string())
    }
}

// ---------------------------------------------------------------- board

/// Test-side handles onto a mock board
#[derive(Clone)]
pub struct Handles {
    pub rtc: MockRtc,
    pub store: MockStore,
    pub modem: MockModem,
    pub trigger: MockTrigger,
    pub camera: MockSerial,
    pub uplink: MockUplink,
    pub system: MockSystem,
}

/// Board with an online modem and a healthy battery
pub fn board(now: NaiveDateTime) -> (Board, Handles) {
    board_with(
        MockRtc::at(now),
        MockModem::online(),
        MockUplink::default(),
        MockBattery::reading(12.46),
    )
}

pub fn board_with(
    rtc: MockRtc,
    modem: MockModem,
    uplink: MockUplink,
    battery: MockBattery,
) -> (Board, Handles) {
    let handles = Handles {
        rtc,
        store: MockStore::default(),
        modem,
        trigger: MockTrigger::default(),
        camera: MockSerial::default(),
        uplink,
        system: MockSystem::default(),
    };

    let board = Board {
        rtc: Box::new(handles.rtc.clone()),
        store: Box::new(handles.store.clone()),
        battery: Box::new(battery),
        modem: Box::new(handles.modem.clone()),
        camera_trigger: Box::new(handles.trigger.clone()),
        camera_link: Box::new(handles.camera.clone()),
        uplink: Box::new(handles.uplink.clone()),
        system: Box::new(handles.system.clone()),
    };
    (board, handles)
}
