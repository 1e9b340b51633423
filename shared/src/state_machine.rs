//! Wake-cycle session state machines
//!
//! Defines the valid transitions of the network session and the camera
//! session. Both are created fresh for every wake cycle.

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult<S, E> {
    /// Transition was valid and state changed (or stayed put legitimately)
    Success(S),
    /// Transition was invalid from current state
    Invalid { from: S, event: E },
}

impl<S, E> TransitionResult<S, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionResult::Success(_))
    }
}

/// Cellular session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Detached,
    Attaching,
    Attached,
    Connecting,
    Connected,
    Failed,
}

/// Events that move the network session
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// Attach requested from the modem
    AttachStarted,
    /// Modem reports carrier attachment
    AttachConfirmed,
    /// Data session requested
    ConnectStarted,
    /// Modem reports an active data session
    ConnectConfirmed,
    /// Modem soft-reset between attempts
    ModemReset,
    /// Modem no longer reports carrier attachment
    RegistrationLost,
    /// Modem still attached but the data session is gone
    DataSessionLost,
    /// Session explicitly detached
    Detach,
    /// Outer retry budget spent
    RetriesExhausted,
}

/// Network session owned by the network manager
#[derive(Debug)]
pub struct NetworkSession {
    current_state: NetworkState,
}

impl Default for NetworkSession {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkSession {
    /// Create a new session in Detached state
    pub fn new() -> Self {
        Self {
            current_state: NetworkState::Detached,
        }
    }

    pub fn state(&self) -> NetworkState {
        self.current_state
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: NetworkEvent) -> TransitionResult<NetworkState, NetworkEvent> {
        match self.get_next_state(&event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn get_next_state(&self, event: &NetworkEvent) -> Option<NetworkState> {
        use NetworkEvent::*;
        use NetworkState::*;

        match (self.current_state, event) {
            (Detached, AttachStarted) => Some(Attaching),

            // Short-circuit when the modem is already where we want it
            (Detached | Attaching | Attached, AttachConfirmed) => Some(Attached),
            (Connected, AttachConfirmed) => Some(Connected),

            (Attached, ConnectStarted) => Some(Connecting),
            (Attached | Connecting | Connected, ConnectConfirmed) => Some(Connected),

            (Attaching | Connecting, ModemReset) => Some(Detached),
            (Attached | Connected, RegistrationLost) => Some(Detached),
            (Connected, DataSessionLost) => Some(Attached),

            (Attaching | Attached | Connecting | Connected | Failed, Detach) => Some(Detached),

            (Attaching | Connecting, RetriesExhausted) => Some(Failed),

            _ => None,
        }
    }
}

/// Camera session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    AwaitingReady,
    ReadyReceived,
    FilenameSent,
    AwaitingLength,
    ReceivingPayload,
    Complete,
    Failed,
}

impl CameraState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CameraState::Complete | CameraState::Failed)
    }
}

/// Events that move the camera session
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    /// Trigger line pulsed, camera is booting
    Triggered,
    /// Ready token matched
    ReadyToken,
    /// Filename written to the link
    FilenameWritten,
    /// Started reading the length line
    LengthRequested,
    /// Valid length parsed
    LengthDeclared,
    /// Last payload byte stored
    PayloadComplete,
    /// Reset budget spent
    Abort,
}

/// Camera session, one per picture cycle
#[derive(Debug)]
pub struct CameraSession {
    current_state: CameraState,
}

impl Default for CameraSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSession {
    pub fn new() -> Self {
        Self {
            current_state: CameraState::Idle,
        }
    }

    pub fn state(&self) -> CameraState {
        self.current_state
    }

    pub fn process_event(&mut self, event: CameraEvent) -> TransitionResult<CameraState, CameraEvent> {
        match self.get_next_state(&event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn get_next_state(&self, event: &CameraEvent) -> Option<CameraState> {
        use CameraEvent::*;
        use CameraState::*;

        if self.current_state.is_terminal() {
            return None;
        }

        match (self.current_state, event) {
            // A new trigger restarts the handshake from the top, never mid-way
            (_, Triggered) => Some(AwaitingReady),

            (AwaitingReady, ReadyToken) => Some(ReadyReceived),
            (ReadyReceived, FilenameWritten) => Some(FilenameSent),
            (FilenameSent, LengthRequested) => Some(AwaitingLength),
            (AwaitingLength, LengthDeclared) => Some(ReceivingPayload),
            (ReceivingPayload, PayloadComplete) => Some(Complete),

            (_, Abort) => Some(Failed),

            _ => None,
        }
    }
}
