//! Camera handshake and picture transfer
//!
//! One reset cycle is: pulse the trigger, greet until the camera answers
//! `ready`, send the filename, read the declared length, then drain exactly
//! that many bytes. Any failure before the payload starts abandons the cycle
//! and the next one begins with a fresh trigger pulse.

use crate::hardware::{SerialLink, TriggerLine};
use crate::poll::Poller;
use bytes::Bytes;
use fieldcam_shared::codec::{self, CaptureName, CodecError, PictureTransfer};
use fieldcam_shared::{CameraEvent, CameraPolicy, CameraSession, CameraState, TransitionResult};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("No ready reply after {attempts} greetings")]
    NoReady { attempts: u32 },

    #[error("No valid length line after {attempts} reads")]
    NoLength { attempts: u32 },

    #[error("Camera link error: {0}")]
    Link(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Camera failed after {cycles} reset cycles")]
    Exhausted {
        cycles: u32,
        last: Option<Box<CameraError>>,
    },
}

fn link_error(e: anyhow::Error) -> CameraError {
    CameraError::Link(e.to_string())
}

pub struct CameraTransferProtocol<'a> {
    link: &'a mut dyn SerialLink,
    trigger: &'a mut dyn TriggerLine,
    policy: &'a CameraPolicy,
    session: CameraSession,
}

impl<'a> CameraTransferProtocol<'a> {
    pub fn new(
        link: &'a mut dyn SerialLink,
        trigger: &'a mut dyn TriggerLine,
        policy: &'a CameraPolicy,
    ) -> Self {
        Self {
            link,
            trigger,
            policy,
            session: CameraSession::new(),
        }
    }

    pub fn state(&self) -> CameraState {
        self.session.state()
    }

    /// Take one picture, returning exactly the declared number of bytes
    pub async fn capture(&mut self, name: &CaptureName) -> Result<Bytes, CameraError> {
        let cycles = self.policy.reset_cycles;
        let mut last = None;

        for cycle in 1..=cycles {
            info!("[CAM] Reset cycle {}/{} for {}", cycle, cycles, name);
            match self.run_cycle(name).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    warn!("[CAM] Cycle {} failed: {}", cycle, e);
                    last = Some(Box::new(e));
                }
            }
        }

        self.transition(CameraEvent::Abort);
        Err(CameraError::Exhausted { cycles, last })
    }

    async fn run_cycle(&mut self, name: &CaptureName) -> Result<Bytes, CameraError> {
        self.pulse_trigger().await?;
        sleep(self.policy.boot_delay()).await;

        self.await_ready().await?;
        sleep(self.policy.settle_delay()).await;

        self.link.write_all(&name.encode()).await.map_err(link_error)?;
        self.transition(CameraEvent::FilenameWritten);
        debug!("[CAM] Sent filename {}", name);

        self.transition(CameraEvent::LengthRequested);
        let declared = self.read_length().await?;
        let mut transfer = PictureTransfer::new(name.to_string(), declared)?;
        self.transition(CameraEvent::LengthDeclared);
        info!("[CAM] Receiving {} bytes", declared);

        self.receive_payload(&mut transfer).await?;
        self.transition(CameraEvent::PayloadComplete);
        info!("[CAM] Picture {} complete", transfer.filename());

        Ok(transfer.into_payload()?)
    }

    async fn pulse_trigger(&mut self) -> Result<(), CameraError> {
        self.trigger.set_low().await.map_err(link_error)?;
        sleep(self.policy.trigger_pulse()).await;
        self.trigger.release().await.map_err(link_error)?;
        self.transition(CameraEvent::Triggered);
        Ok(())
    }

    async fn await_ready(&mut self) -> Result<(), CameraError> {
        let mut poller = Poller::new(self.policy.greeting);

        while let Some(attempt) = poller.next_attempt().await {
            if let Err(e) = self.link.write_all(codec::GREETING).await {
                debug!("[CAM] Greeting {} not sent: {}", attempt, e);
                continue;
            }

            match self.read_reply(attempt).await {
                Some(line) if codec::is_ready_reply(&line) => {
                    debug!("[CAM] Ready after {} greetings", attempt);
                    self.transition(CameraEvent::ReadyToken);
                    return Ok(());
                }
                Some(line) => debug!(
                    "[CAM] Unexpected greeting reply {:?}",
                    String::from_utf8_lossy(&line)
                ),
                None => trace!("[CAM] No greeting reply ({})", attempt),
            }
        }

        Err(CameraError::NoReady {
            attempts: poller.attempts(),
        })
    }

    async fn read_length(&mut self) -> Result<usize, CameraError> {
        let mut poller = Poller::new(self.policy.length);

        while let Some(attempt) = poller.next_attempt().await {
            let Some(line) = self.read_reply(attempt).await else {
                continue;
            };

            match codec::parse_length_line(&line) {
                Ok(length) => return Ok(length),
                Err(CodecError::PictureTooLarge(length)) => {
                    return Err(CodecError::PictureTooLarge(length).into());
                }
                Err(e) => warn!("[CAM] Discarding length line {}: {}", attempt, e),
            }
        }

        Err(CameraError::NoLength {
            attempts: poller.attempts(),
        })
    }

    /// One handshake read; a link error counts as a missed reply
    async fn read_reply(&mut self, attempt: u32) -> Option<Vec<u8>> {
        match self.link.read_line(self.policy.reply_timeout()).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("[CAM] Read {} failed: {}", attempt, e);
                None
            }
        }
    }

    /// Drain the payload into `transfer`
    ///
    /// Reads are capped at both what the link reports available and what is
    /// left of the declared length. There is no inter-byte timeout; a camera
    /// that stalls here is recovered by the alarm reset.
    async fn receive_payload(&mut self, transfer: &mut PictureTransfer) -> Result<(), CameraError> {
        while !transfer.is_complete() {
            let available = self.link.available().await.map_err(link_error)?;
            if available == 0 {
                sleep(self.policy.payload_poll()).await;
                continue;
            }

            let want = available.min(transfer.remaining());
            let copied = self
                .link
                .read_available(&mut transfer.unfilled_mut()[..want])
                .await
                .map_err(link_error)?;
            if copied == 0 {
                sleep(self.policy.payload_poll()).await;
                continue;
            }

            transfer.commit(copied)?;
            trace!(
                "[CAM] {}/{} bytes",
                transfer.bytes_received(),
                transfer.declared_len()
            );
        }
        Ok(())
    }

    fn transition(&mut self, event: CameraEvent) {
        if let TransitionResult::Invalid { from, event } = self.session.process_event(event) {
            debug!("[CAM] Ignored {:?} in {:?}", event, from);
        }
    }
}
