//! Minimal AT-command cellular modem

use crate::hardware::serial::SerialPortLink;
use crate::hardware::traits::{Modem, SerialLink};
use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

/// Ctrl-Z ends an SMS body in text mode
const SMS_TERMINATOR: u8 = 0x1A;

/// 3GPP modem spoken to over a serial port
pub struct AtModem {
    link: SerialPortLink,
    command_timeout: Duration,
}

impl AtModem {
    pub fn open(path: &str, baud: u32, command_timeout: Duration) -> Result<Self> {
        Ok(Self {
            link: SerialPortLink::open(path, baud)?,
            command_timeout,
        })
    }

    /// Send a command and collect its information lines up to the final `OK`
    async fn command(&mut self, command: &str) -> Result<Vec<String>> {
        debug!("[MODEM] > {}", command);
        self.link.write_all(format!("{}\r", command).as_bytes()).await?;
        self.final_response(command).await
    }

    async fn final_response(&mut self, command: &str) -> Result<Vec<String>> {
        let deadline = Instant::now() + self.command_timeout;
        let mut lines = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                bail!("{}: no final response within {:?}", command, self.command_timeout);
            }

            let Some(raw) = self.link.read_line(remaining).await? else {
                continue;
            };
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            debug!("[MODEM] < {}", line);

            match line.as_str() {
                "" => {}
                "OK" => return Ok(lines),
                "ERROR" => bail!("{}: ERROR", command),
                l if l.starts_with("+CME ERROR") || l.starts_with("+CMS ERROR") => {
                    bail!("{}: {}", command, l)
                }
                // Command echo
                l if l == command => {}
                other => lines.push(other.to_string()),
            }
        }
    }
}

/// Is the first numeric field of the `prefix` response line set to 1?
fn flag_set(lines: &[String], prefix: &str) -> bool {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix(prefix))
        .filter_map(|rest| rest.trim_start_matches(':').split(',').next())
        .any(|field| field.trim() == "1")
}

/// Is context 1 active in a `+CGACT?` response?
fn context_active(lines: &[String]) -> bool {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("+CGACT:"))
        .any(|rest| {
            let mut fields = rest.split(',').map(str::trim);
            matches!((fields.next(), fields.next()), (Some("1"), Some("1")))
        })
}

#[async_trait]
impl Modem for AtModem {
    async fn is_attached(&mut self) -> Result<bool> {
        let lines = self.command("AT+CGATT?").await?;
        Ok(flag_set(&lines, "+CGATT"))
    }

    async fn attach(&mut self) -> Result<()> {
        self.command("AT+CGATT=1").await.map(|_| ())
    }

    async fn is_connected(&mut self) -> Result<bool> {
        let lines = self.command("AT+CGACT?").await?;
        Ok(context_active(&lines))
    }

    async fn connect(&mut self, apn: &str) -> Result<()> {
        self.command(&format!("AT+CGDCONT=1,\"IP\",\"{}\"", apn)).await?;
        self.command("AT+CGACT=1,1").await.map(|_| ())
    }

    async fn detach(&mut self) -> Result<()> {
        self.command("AT+CGATT=0").await.map(|_| ())
    }

    async fn soft_reset(&mut self) -> Result<()> {
        self.command("AT+CFUN=1,1").await.map(|_| ())
    }

    async fn send_sms(&mut self, recipient: &str, text: &str) -> Result<()> {
        self.command("AT+CMGF=1").await?;

        let header = format!("AT+CMGS=\"{}\"", recipient);
        self.link.write_all(format!("{}\r", header).as_bytes()).await?;
        // The prompt carries no line terminator, give the modem time to show it
        sleep(Duration::from_millis(500)).await;

        let mut body = text.as_bytes().to_vec();
        body.push(SMS_TERMINATOR);
        self.link.write_all(&body).await?;
        self.final_response(&header).await.map(|_| ())
    }
}
