//! Camera link framing
//!
//! The station and the camera module talk over a plain serial line:
//! ```text
//! station -> camera : "Hello\0"                               (repeated)
//! camera  -> station: "ready"
//! station -> camera : "<station>_<YYYYMMDDHHMM>[_<tenths>]\0"
//! camera  -> station: "<decimal length>\r\n"
//! camera  -> station: <length raw bytes, no framing>
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use std::fmt;
use thiserror::Error;

/// Greeting sent until the camera answers
pub const GREETING: &[u8] = b"Hello\0";

/// Reply that ends the greeting loop
pub const READY_TOKEN: &[u8] = b"ready";

/// Largest picture the station will allocate a buffer for (8 MB)
pub const MAX_PICTURE_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur while framing camera traffic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Empty length line")]
    EmptyLength,

    #[error("Malformed length line: {0:?}")]
    MalformedLength(String),

    #[error("Picture too large: {0} bytes (max: {MAX_PICTURE_SIZE})")]
    PictureTooLarge(usize),

    #[error("Overrun: {received} + {chunk} bytes exceeds declared length {declared}")]
    Overrun {
        declared: usize,
        received: usize,
        chunk: usize,
    },

    #[error("Incomplete transfer: {received} of {declared} bytes")]
    Incomplete { declared: usize, received: usize },
}

/// Does this line answer the greeting?
///
/// The line terminator, if the camera sent one, is not part of the comparison.
pub fn is_ready_reply(line: &[u8]) -> bool {
    strip_line_ending(line) == READY_TOKEN
}

fn strip_line_ending(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    line
}

/// Parse the declared picture length
///
/// Accepts ASCII decimal digits surrounded by optional whitespace, e.g. `"1234\r\n"`.
pub fn parse_length_line(line: &[u8]) -> Result<usize, CodecError> {
    let digits = line.trim_ascii();
    if digits.is_empty() {
        return Err(CodecError::EmptyLength);
    }

    let malformed = || CodecError::MalformedLength(String::from_utf8_lossy(line).into_owned());

    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }

    let length: usize = std::str::from_utf8(digits)
        .map_err(|_| malformed())?
        .parse()
        .map_err(|_| malformed())?;

    if length > MAX_PICTURE_SIZE {
        return Err(CodecError::PictureTooLarge(length));
    }

    Ok(length)
}

/// Name the camera stores the picture under
///
/// Positional fields joined by underscores only; the camera uses it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureName {
    station_id: u32,
    taken_at: NaiveDateTime,
    voltage_tenths: Option<u32>,
}

impl CaptureName {
    pub fn new(station_id: u32, taken_at: NaiveDateTime) -> Self {
        Self {
            station_id,
            taken_at,
            voltage_tenths: None,
        }
    }

    /// Append the battery voltage, in tenths of a volt
    pub fn with_voltage(mut self, volts: f32) -> Self {
        self.voltage_tenths = Some((volts.max(0.0) * 10.0).round() as u32);
        self
    }

    /// NUL-terminated bytes as written to the link
    pub fn encode(&self) -> Bytes {
        let name = self.to_string();
        let mut buf = BytesMut::with_capacity(name.len() + 1);
        buf.put_slice(name.as_bytes());
        buf.put_u8(0);
        buf.freeze()
    }
}

impl fmt::Display for CaptureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}",
            self.station_id,
            self.taken_at.format("%Y%m%d%H%M")
        )?;
        if let Some(tenths) = self.voltage_tenths {
            write!(f, "_{}", tenths)?;
        }
        Ok(())
    }
}

/// Accumulates a length-prefixed picture from partial reads
///
/// The buffer is sized to the declared length up front; reads land in
/// `unfilled_mut()` and are committed with `commit()`, so no read can ever
/// run past the declared length.
#[derive(Debug)]
pub struct PictureTransfer {
    filename: String,
    buffer: Vec<u8>,
    received: usize,
}

impl PictureTransfer {
    pub fn new(filename: impl Into<String>, declared: usize) -> Result<Self, CodecError> {
        if declared > MAX_PICTURE_SIZE {
            return Err(CodecError::PictureTooLarge(declared));
        }
        Ok(Self {
            filename: filename.into(),
            buffer: vec![0u8; declared],
            received: 0,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn bytes_received(&self) -> usize {
        self.received
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.buffer.len()
    }

    /// The part of the buffer not yet filled
    pub fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.received..]
    }

    /// Mark `count` bytes written into `unfilled_mut()` as received
    pub fn commit(&mut self, count: usize) -> Result<(), CodecError> {
        if count > self.remaining() {
            return Err(CodecError::Overrun {
                declared: self.buffer.len(),
                received: self.received,
                chunk: count,
            });
        }
        self.received += count;
        Ok(())
    }

    /// Finish the transfer, handing out the payload
    pub fn into_payload(self) -> Result<Bytes, CodecError> {
        if !self.is_complete() {
            return Err(CodecError::Incomplete {
                declared: self.buffer.len(),
                received: self.received,
            });
        }
        Ok(Bytes::from(self.buffer))
    }
}
