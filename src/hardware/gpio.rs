//! sysfs-backed trigger line and battery ADC

use crate::hardware::traits::{TriggerLine, VoltageSensor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Open-drain output exported through `/sys/class/gpio/gpioN/value`
///
/// Writing `0` pulls the line low; writing `1` lets the camera's pull-up take it.
pub struct SysfsTrigger {
    value_path: PathBuf,
}

impl SysfsTrigger {
    pub fn new(value_path: impl Into<PathBuf>) -> Self {
        Self {
            value_path: value_path.into(),
        }
    }

    async fn write(&self, value: &str) -> Result<()> {
        tokio::fs::write(&self.value_path, value)
            .await
            .with_context(|| format!("Failed to drive {}", self.value_path.display()))
    }
}

#[async_trait]
impl TriggerLine for SysfsTrigger {
    async fn set_low(&mut self) -> Result<()> {
        self.write("0").await
    }

    async fn release(&mut self) -> Result<()> {
        self.write("1").await
    }
}

/// Battery voltage from an IIO raw channel
pub struct SysfsAdc {
    raw_path: PathBuf,
    volts_per_count: f32,
}

impl SysfsAdc {
    pub fn new(raw_path: impl Into<PathBuf>, volts_per_count: f32) -> Self {
        Self {
            raw_path: raw_path.into(),
            volts_per_count,
        }
    }
}

#[async_trait]
impl VoltageSensor for SysfsAdc {
    async fn read_voltage(&mut self) -> Result<f32> {
        let raw = tokio::fs::read_to_string(&self.raw_path)
            .await
            .with_context(|| format!("Failed to read {}", self.raw_path.display()))?;
        let counts: u32 = raw
            .trim()
            .parse()
            .with_context(|| format!("Unexpected ADC reading {:?}", raw.trim()))?;
        Ok(counts as f32 * self.volts_per_count)
    }
}
