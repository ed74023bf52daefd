//! Error types for the flasher

use thiserror::Error;

/// Main error type for the flasher
#[derive(Error, Debug)]
pub enum FlasherError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("Connection error on {path}: {reason}")]
    ConnectionError { path: String, reason: String },

    #[error("Volume query error: {0}")]
    VolumeQueryError(String),

    #[error("Flash tool failed with exit code {0}")]
    FlashToolFailed(i32),

    #[error("Flash tool error: {0}")]
    FlashToolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
