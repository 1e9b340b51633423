//! tokio-serial backed serial link

use crate::hardware::traits::SerialLink;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout_at, Duration, Instant};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// Serial port with line buffering
///
/// Bytes read past a line terminator stay in `pending` and are served first
/// by the next read.
pub struct SerialPortLink {
    path: String,
    port: Option<SerialStream>,
    pending: BytesMut,
}

impl SerialPortLink {
    /// Open `path` at `baud` 8N1
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud)
            .open_native_async()
            .with_context(|| format!("Failed to open serial port {} at {} baud", path, baud))?;
        debug!("[SERIAL] Opened {} at {} baud", path, baud);

        Ok(Self {
            path: path.to_string(),
            port: Some(port),
            pending: BytesMut::with_capacity(256),
        })
    }

    fn port(&mut self) -> Result<&mut SerialStream> {
        let path = &self.path;
        self.port
            .as_mut()
            .ok_or_else(|| anyhow!("Serial port {} released", path))
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        Some(self.pending.split_to(end + 1).to_vec())
    }
}

#[async_trait]
impl SerialLink for SerialPortLink {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            let mut chunk = [0u8; 128];
            let port = self.port()?;
            match timeout_at(deadline, port.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => self.pending.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(anyhow!("Read error on {}: {}", self.path, e)),
                Err(_) => break,
            }
        }

        if self.pending.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.pending.split().to_vec()))
        }
    }

    async fn available(&mut self) -> Result<usize> {
        let buffered = self.pending.len();
        let waiting = self.port()?.bytes_to_read()?;
        Ok(buffered + waiting as usize)
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.pending.is_empty() {
            let count = buf.len().min(self.pending.len());
            buf[..count].copy_from_slice(&self.pending[..count]);
            self.pending.advance(count);
            return Ok(count);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let count = self.port()?.read(buf).await?;
        Ok(count)
    }

    async fn release(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("[SERIAL] Released {}", self.path);
        }
        self.pending.clear();
        Ok(())
    }
}
