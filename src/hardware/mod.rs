//! Station hardware
//!
//! `Board` owns one handle per collaborator. The cycle lends each component
//! the parts it needs; nothing reaches hardware through a global.

pub mod gpio;
pub mod modem;
pub mod rtc;
pub mod serial;
pub mod store;
pub mod system;
pub mod traits;

#[cfg(test)]
pub mod mock;

use crate::config::Config;
use crate::scheduler::AlarmSender;
use crate::upload::HttpTransport;
use anyhow::Result;
use tracing::info;

pub use traits::{
    Modem, NonVolatileStore, Rtc, SerialLink, SystemControl, TriggerLine, UploadTransport,
    VoltageSensor,
};

pub struct Board {
    pub rtc: Box<dyn Rtc>,
    pub store: Box<dyn NonVolatileStore>,
    pub battery: Box<dyn VoltageSensor>,
    pub modem: Box<dyn Modem>,
    pub camera_trigger: Box<dyn TriggerLine>,
    pub camera_link: Box<dyn SerialLink>,
    pub uplink: Box<dyn UploadTransport>,
    pub system: Box<dyn SystemControl>,
}

impl Board {
    /// Open the host backends named in the configuration
    pub fn open(config: &Config, alarm_tx: AlarmSender) -> Result<Self> {
        let modem = modem::AtModem::open(
            &config.network.modem_port,
            config.network.modem_baud,
            config.network.command_timeout(),
        )?;
        let camera_link = serial::SerialPortLink::open(&config.camera.port, config.camera.baud)?;

        info!(
            "Board ready: modem {}, camera {}, state {}",
            config.network.modem_port,
            config.camera.port,
            config.power.state_path.display()
        );

        Ok(Self {
            rtc: Box::new(rtc::SystemRtc::new(alarm_tx)),
            store: Box::new(store::FileStore::open(&config.power.state_path)?),
            battery: Box::new(gpio::SysfsAdc::new(
                &config.power.adc_path,
                config.power.volts_per_count,
            )),
            modem: Box::new(modem),
            camera_trigger: Box::new(gpio::SysfsTrigger::new(&config.camera.trigger_gpio)),
            camera_link: Box::new(camera_link),
            uplink: Box::new(HttpTransport::new(config.upload.request_timeout())?),
            system: Box::new(system::HostSystem::new(config.power.reset_exit_code)),
        })
    }
}
