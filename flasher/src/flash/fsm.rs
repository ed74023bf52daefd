//! Finite State Machine for one flash request

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::progress::FlashOutcome;
use crate::storage::settings::Settings;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Quick check for a board already in bootloader mode
    pub precheck_timeout: Duration,

    /// Bound on waiting for the bootloader volume after a reset
    pub verify_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            precheck_timeout: Duration::from_millis(100),
            verify_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Settings> for OrchestratorSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            precheck_timeout: settings.bootloader.precheck_timeout(),
            verify_timeout: settings.bootloader.verify_timeout(),
        }
    }
}

/// Flash state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashState {
    /// Nothing done yet
    Idle,

    /// Resetting the board into its bootloader
    RequestingBootloader,

    /// Waiting for the bootloader volume
    VerifyingBootloader,

    /// Original port path vanished, looking the board up by serial
    Relocating,

    /// Flash tool running
    Flashing,

    /// Firmware written
    Succeeded,

    /// Stopped with a failure
    Failed(FlashOutcome),
}

impl FlashState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlashState::Succeeded | FlashState::Failed(_))
    }
}

/// Flash event
#[derive(Debug, Clone)]
pub enum FlashEvent {
    /// Start the request
    Begin,

    /// Reset requested, or the board was already in bootloader mode
    BootloaderRequested,

    /// Bootloader volume seen; `port_present` tells whether the original
    /// port path is still enumerated
    BootloaderVerified { port_present: bool },

    /// Board found again under a new path
    Relocated,

    /// Flash tool exited successfully
    FlashCompleted,

    /// Any failure
    Fail(FlashOutcome),
}

/// Flash FSM
#[derive(Debug, Clone)]
pub struct FlashFsm {
    state: FlashState,
    reset_requested: bool,
}

impl FlashFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: FlashState::Idle,
            reset_requested: false,
        }
    }

    /// Get current state
    pub fn state(&self) -> &FlashState {
        &self.state
    }

    /// Whether the board may have been put in bootloader mode
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// The outcome of a finished request
    pub fn outcome(&self) -> Option<FlashOutcome> {
        match &self.state {
            FlashState::Succeeded => Some(FlashOutcome::Success),
            FlashState::Failed(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: FlashEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (FlashState::Idle, FlashEvent::Begin) => FlashState::RequestingBootloader,

            (FlashState::RequestingBootloader, FlashEvent::BootloaderRequested) => {
                self.reset_requested = true;
                FlashState::VerifyingBootloader
            }

            (FlashState::VerifyingBootloader, FlashEvent::BootloaderVerified { port_present: true }) => {
                FlashState::Flashing
            }
            (FlashState::VerifyingBootloader, FlashEvent::BootloaderVerified { port_present: false }) => {
                FlashState::Relocating
            }

            (FlashState::Relocating, FlashEvent::Relocated) => FlashState::Flashing,

            (FlashState::Flashing, FlashEvent::FlashCompleted) => FlashState::Succeeded,

            // Only a successful flash ends in success
            (_, FlashEvent::Fail(FlashOutcome::Success)) => {
                return Err("Success is not a failure outcome".to_string());
            }
            (state, FlashEvent::Fail(outcome)) if !state.is_terminal() => {
                FlashState::Failed(outcome.clone())
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for FlashFsm {
    fn default() -> Self {
        Self::new()
    }
}
