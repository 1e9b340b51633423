//! Bounded-retry network manager
//!
//! Attach and data connect share one shape: an outer attempt issues the
//! request and polls for completion; a failed attempt soft-resets the modem
//! before the next one. Nothing here retries past its policy.

use crate::config::NetworkConfig;
use crate::hardware::Modem;
use crate::poll::Poller;
use fieldcam_shared::{NetworkEvent, NetworkSession, NetworkState, RetryPolicy, TransitionResult};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Network attach failed after {attempts} attempts")]
    AttachExhausted { attempts: u32 },

    #[error("Data session failed after {attempts} attempts")]
    ConnectExhausted { attempts: u32 },
}

/// Which status a poll loop waits for
#[derive(Debug, Clone, Copy)]
enum Stage {
    Attach,
    Connect,
}

pub struct NetworkManager<'a> {
    modem: &'a mut dyn Modem,
    config: &'a NetworkConfig,
    session: NetworkSession,
    soft_resets: u32,
}

impl<'a> NetworkManager<'a> {
    pub fn new(modem: &'a mut dyn Modem, config: &'a NetworkConfig) -> Self {
        Self {
            modem,
            config,
            session: NetworkSession::new(),
            soft_resets: 0,
        }
    }

    pub fn state(&self) -> NetworkState {
        self.session.state()
    }

    /// Modem soft resets issued by this manager
    pub fn soft_resets(&self) -> u32 {
        self.soft_resets
    }

    /// Register on the cellular network
    ///
    /// Short-circuits only when the modem itself reports attachment; the
    /// session state alone is never trusted.
    pub async fn attach(&mut self) -> Result<NetworkState, NetworkError> {
        if self.probe(Stage::Attach).await {
            debug!("[NET] Already attached");
            self.transition(NetworkEvent::AttachConfirmed);
            return Ok(self.state());
        }
        if matches!(self.state(), NetworkState::Attached | NetworkState::Connected) {
            warn!("[NET] Modem lost registration");
            self.transition(NetworkEvent::RegistrationLost);
        }

        let policy = self.config.attach;
        for attempt in 1..=policy.max_attempts {
            self.transition(NetworkEvent::AttachStarted);
            info!("[NET] Attach attempt {}/{}", attempt, policy.max_attempts);
            if let Err(e) = self.modem.attach().await {
                warn!("[NET] Attach request failed: {}", e);
            }

            if self.poll_until(Stage::Attach, &policy).await {
                info!("[NET] Attached on attempt {}", attempt);
                self.transition(NetworkEvent::AttachConfirmed);
                return Ok(self.state());
            }

            if attempt < policy.max_attempts {
                self.soft_reset().await;
            }
        }

        error!("[NET] Attach exhausted after {} attempts", policy.max_attempts);
        self.transition(NetworkEvent::RetriesExhausted);
        Err(NetworkError::AttachExhausted {
            attempts: policy.max_attempts,
        })
    }

    /// Bring up the packet data session
    ///
    /// Re-attaches first when a soft reset dropped the registration. On
    /// exhaustion the modem is explicitly detached.
    pub async fn connect_data(&mut self) -> Result<NetworkState, NetworkError> {
        if matches!(self.state(), NetworkState::Attached | NetworkState::Connected) {
            if self.probe(Stage::Connect).await {
                debug!("[NET] Data session already up");
                self.transition(NetworkEvent::ConnectConfirmed);
                return Ok(self.state());
            }
            if self.state() == NetworkState::Connected {
                warn!("[NET] Data session dropped");
                self.transition(NetworkEvent::DataSessionLost);
            }
        }

        let policy = self.config.connect;
        for attempt in 1..=policy.max_attempts {
            if self.state() != NetworkState::Attached {
                if let Err(e) = self.attach().await {
                    warn!("[NET] Re-attach before connect failed: {}", e);
                    break;
                }
            }

            self.transition(NetworkEvent::ConnectStarted);
            info!(
                "[NET] Connect attempt {}/{} (APN {})",
                attempt, policy.max_attempts, self.config.apn
            );
            if let Err(e) = self.modem.connect(&self.config.apn).await {
                warn!("[NET] Connect request failed: {}", e);
            }

            if self.poll_until(Stage::Connect, &policy).await {
                info!("[NET] Data session up on attempt {}", attempt);
                self.transition(NetworkEvent::ConnectConfirmed);
                return Ok(self.state());
            }

            if attempt < policy.max_attempts {
                self.soft_reset().await;
            }
        }

        error!("[NET] Data session exhausted, detaching");
        if let Err(e) = self.modem.detach().await {
            warn!("[NET] Detach failed: {}", e);
        }
        self.transition(NetworkEvent::Detach);
        Err(NetworkError::ConnectExhausted {
            attempts: policy.max_attempts,
        })
    }

    /// Send a status SMS, then make sure the registration survived it
    ///
    /// Sending never fails the cycle; a failed send is only logged.
    pub async fn send_status_sms(&mut self, recipient: &str, text: &str) -> Result<(), NetworkError> {
        match self.modem.send_sms(recipient, text).await {
            Ok(()) => info!("[NET] Status SMS sent to {}", recipient),
            Err(e) => warn!("[NET] Status SMS to {} failed: {}", recipient, e),
        }
        self.attach().await.map(|_| ())
    }

    /// One status check, I/O errors read as "not yet"
    async fn probe(&mut self, stage: Stage) -> bool {
        let status = match stage {
            Stage::Attach => self.modem.is_attached().await,
            Stage::Connect => self.modem.is_connected().await,
        };
        match status {
            Ok(up) => up,
            Err(e) => {
                debug!("[NET] {:?} status check failed: {}", stage, e);
                false
            }
        }
    }

    async fn poll_until(&mut self, stage: Stage, policy: &RetryPolicy) -> bool {
        let mut poller = Poller::new(policy.poll);
        while let Some(check) = poller.next_attempt().await {
            if self.probe(stage).await {
                debug!("[NET] {:?} confirmed after {:?}", stage, poller.elapsed());
                return true;
            }
            debug!("[NET] {:?} check {}/{} negative", stage, check, poller.max_checks());
        }
        false
    }

    async fn soft_reset(&mut self) {
        warn!("[NET] Soft-resetting modem");
        if let Err(e) = self.modem.soft_reset().await {
            warn!("[NET] Soft reset failed: {}", e);
        }
        self.soft_resets += 1;
        self.transition(NetworkEvent::ModemReset);
    }

    fn transition(&mut self, event: NetworkEvent) {
        if let TransitionResult::Invalid { from, event } = self.session.process_event(event) {
            debug!("[NET] Ignored {:?} in {:?}", event, from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockModem;
    use fieldcam_shared::PollPolicy;
    use tokio::time::{Duration, Instant};

    fn config() -> NetworkConfig {
        NetworkConfig {
            attach: RetryPolicy::new(5, PollPolicy::new(15, 2000)),
            connect: RetryPolicy::new(5, PollPolicy::new(10, 1000)),
            ..NetworkConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_on_second_attempt_resets_once() {
        let mut modem = MockModem::default();
        modem.script().attach_ready_at = Some((2, 3));
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        let state = manager.attach().await.unwrap();
        assert_eq!(state, NetworkState::Attached);
        assert_eq!(manager.soft_resets(), 1);

        let script = modem.script();
        assert_eq!(script.soft_resets, 1);
        assert_eq!(script.attach_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_exhaustion() {
        let mut modem = MockModem::default();
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        let started = Instant::now();
        let result = manager.attach().await;
        assert_eq!(result, Err(NetworkError::AttachExhausted { attempts: 5 }));
        assert_eq!(manager.state(), NetworkState::Failed);
        // No reset after the final attempt
        assert_eq!(manager.soft_resets(), 4);
        // 5 attempts of 14 inter-check sleeps each
        assert!(started.elapsed() >= Duration::from_secs(5 * 14 * 2));
        assert!(started.elapsed() < Duration::from_secs(5 * 15 * 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_attached_short_circuits() {
        let mut modem = MockModem::default();
        modem.script().attached = true;
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        assert_eq!(manager.attach().await.unwrap(), NetworkState::Attached);
        assert_eq!(modem.script().attach_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_count_as_failed_polls() {
        let mut modem = MockModem::default();
        {
            let mut script = modem.script();
            script.attach_ready_at = Some((1, 1));
            // Entry probe plus two in-loop checks
            script.poll_errors = 3;
        }
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        assert_eq!(manager.attach().await.unwrap(), NetworkState::Attached);
        assert_eq!(manager.soft_resets(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_never_up_detaches() {
        let mut modem = MockModem::default();
        modem.script().attach_ready_at = Some((1, 1));
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        manager.attach().await.unwrap();
        let result = manager.connect_data().await;

        assert_eq!(result, Err(NetworkError::ConnectExhausted { attempts: 5 }));
        assert_eq!(manager.state(), NetworkState::Detached);
        let script = modem.script();
        assert_eq!(script.detach_calls, 1);
        assert_eq!(script.connect_calls, 5);
        assert_eq!(script.soft_resets, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_attach() {
        let mut modem = MockModem::online();
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        manager.attach().await.unwrap();
        assert_eq!(manager.connect_data().await.unwrap(), NetworkState::Connected);
        // Connected stays connected
        assert_eq!(manager.attach().await.unwrap(), NetworkState::Connected);
        assert_eq!(modem.script().soft_resets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_dropped_during_sms_is_reattached() {
        let mut modem = MockModem::online();
        let handle = modem.clone();
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        manager.attach().await.unwrap();
        assert_eq!(handle.script().attach_calls, 1);
        {
            // Registration drops and only a fresh attach brings it back
            let mut script = handle.script();
            script.attached = false;
            script.attach_ready_at = Some((2, 1));
        }

        manager.send_status_sms("+15550100", "station 55 ok").await.unwrap();
        assert_eq!(manager.state(), NetworkState::Attached);

        let script = handle.script();
        assert!(script.attached);
        assert_eq!(script.attach_calls, 2);
        assert_eq!(script.soft_resets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_data_session_reconnects() {
        let mut modem = MockModem::online();
        let handle = modem.clone();
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        manager.attach().await.unwrap();
        manager.connect_data().await.unwrap();
        {
            let mut script = handle.script();
            script.connected = false;
            script.connect_ready_at = Some((2, 1));
        }

        assert_eq!(manager.connect_data().await.unwrap(), NetworkState::Connected);
        assert_eq!(handle.script().connect_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_sms_then_reattach() {
        let mut modem = MockModem::online();
        let config = config();
        let mut manager = NetworkManager::new(&mut modem, &config);

        manager.attach().await.unwrap();
        manager.send_status_sms("+15550100", "station 55 ok").await.unwrap();
        assert_eq!(manager.state(), NetworkState::Attached);

        let script = modem.script();
        assert_eq!(script.sms.len(), 1);
        assert_eq!(script.sms[0].0, "+15550100");
    }
}
