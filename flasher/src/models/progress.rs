//! Progress messages and flash outcomes

use serde::{Deserialize, Serialize};

/// One update on the progress channel.
///
/// `ok == false` ends the stream with a failure. `ok && done` ends it with
/// success. Anything else is an intermediate update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub text: String,
    pub ok: bool,
    pub done: bool,
}

impl ProgressMessage {
    pub fn step(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: true,
            done: false,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: true,
            done: true,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: false,
            done: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.ok || self.done
    }

    pub fn is_success(&self) -> bool {
        self.ok && self.done
    }
}

/// Final result of one flash request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum FlashOutcome {
    Success,
    BootloaderRequestFailed,
    BootloaderNotVerified,
    DeviceLost,
    FlashToolFailed(i32),
    FlashToolError(String),
    /// Stopped by the caller. `after_reset` is set when the board may have
    /// been left in bootloader mode.
    Cancelled { after_reset: bool },
}

impl FlashOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlashOutcome::Success)
    }

    /// The terminal message reported for this outcome
    pub fn to_message(&self) -> ProgressMessage {
        match self {
            FlashOutcome::Success => ProgressMessage::success("Board flash successful."),
            FlashOutcome::BootloaderRequestFailed => ProgressMessage::failure(
                "Failed to put the board in bootloader mode. Check that it is connected and not in use.",
            ),
            FlashOutcome::BootloaderNotVerified => ProgressMessage::failure(
                "Something went wrong. Failed to put board in bootloader mode.",
            ),
            FlashOutcome::DeviceLost => ProgressMessage::failure(
                "Failed to locate board after putting in bootloader mode. Please try again.",
            ),
            FlashOutcome::FlashToolFailed(code) => ProgressMessage::failure(format!(
                "Something went wrong. Flashing failed (exit code {}).",
                code
            )),
            FlashOutcome::FlashToolError(reason) => {
                ProgressMessage::failure(format!("Flashing failed: {}", reason))
            }
            FlashOutcome::Cancelled { after_reset: false } => {
                ProgressMessage::failure("Flashing cancelled. The board was not changed.")
            }
            FlashOutcome::Cancelled { after_reset: true } => ProgressMessage::failure(
                "Flashing cancelled. The board may still be in bootloader mode; flash again or reconnect it.",
            ),
        }
    }
}
