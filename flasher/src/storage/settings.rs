//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::FlasherError;
use crate::filesys::file::File;
use crate::logs::{LogFormat, LogLevel, LogOptions};
use crate::models::board::UsbId;

/// Flasher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Plain text or JSON log lines
    #[serde(default)]
    pub log_format: LogFormat,

    /// Bootloader entry and detection
    #[serde(default)]
    pub bootloader: BootloaderSettings,

    /// External flashing tool
    #[serde(default)]
    pub flash_tool: FlashToolSettings,

    /// USB identifiers accepted as flashable boards
    #[serde(default = "default_known_devices")]
    pub known_devices: Vec<UsbId>,
}

/// QT Py application-mode and bootloader-mode identifiers.
fn default_known_devices() -> Vec<UsbId> {
    vec![
        UsbId::new(0x239A, 0x80CB),
        UsbId::new(0x239A, 0x00CB),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            bootloader: BootloaderSettings::default(),
            flash_tool: FlashToolSettings::default(),
            known_devices: default_known_devices(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub async fn load(file: &File) -> Result<Self, FlasherError> {
        let settings: Settings = file.read_json().await?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level,
            format: self.log_format,
        }
    }

    /// Reject values the flashing sequence cannot work with
    pub fn validate(&self) -> Result<(), FlasherError> {
        if self.bootloader.volume_label.trim().is_empty() {
            return Err(FlasherError::ConfigError(
                "bootloader.volume_label must not be empty".to_string(),
            ));
        }
        if self.bootloader.poll_interval_ms == 0 {
            return Err(FlasherError::ConfigError(
                "bootloader.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.known_devices.is_empty() {
            return Err(FlasherError::ConfigError(
                "known_devices must list at least one vendor/product pair".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bootloader settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootloaderSettings {
    /// Label of the mass-storage volume exposed by the bootloader
    #[serde(default = "default_volume_label")]
    pub volume_label: String,

    /// Baud rate that asks the running firmware to reset into the bootloader
    #[serde(default = "default_reset_baud_rate")]
    pub reset_baud_rate: u32,

    /// How long the reset connection is held open
    #[serde(default = "default_reset_hold_ms")]
    pub reset_hold_ms: u64,

    /// Quick check for a board that is already in bootloader mode
    #[serde(default = "default_precheck_timeout_ms")]
    pub precheck_timeout_ms: u64,

    /// Upper bound on waiting for the bootloader volume after a reset
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,

    /// Delay between volume checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Directories whose entries are treated as mounted volumes (Unix only).
    /// When absent, the platform defaults are used.
    #[serde(default)]
    pub volume_roots: Option<Vec<PathBuf>>,
}

fn default_volume_label() -> String {
    "QTPY_BOOT".to_string()
}

fn default_reset_baud_rate() -> u32 {
    1200
}

fn default_reset_hold_ms() -> u64 {
    1000
}

fn default_precheck_timeout_ms() -> u64 {
    100
}

fn default_verify_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for BootloaderSettings {
    fn default() -> Self {
        Self {
            volume_label: default_volume_label(),
            reset_baud_rate: default_reset_baud_rate(),
            reset_hold_ms: default_reset_hold_ms(),
            precheck_timeout_ms: default_precheck_timeout_ms(),
            verify_timeout_ms: default_verify_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            volume_roots: None,
        }
    }
}

impl BootloaderSettings {
    pub fn reset_hold(&self) -> Duration {
        Duration::from_millis(self.reset_hold_ms)
    }

    pub fn precheck_timeout(&self) -> Duration {
        Duration::from_millis(self.precheck_timeout_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Flash tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashToolSettings {
    /// Path to the bossac executable, or a name resolved through `PATH`
    #[serde(default = "default_tool_path")]
    pub path: PathBuf,

    /// Application start address used by the bootloader
    #[serde(default = "default_flash_offset")]
    pub offset: u32,

    /// Watchdog for the flashing process. `None` waits indefinitely.
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_tool_path() -> PathBuf {
    PathBuf::from("bossac")
}

fn default_flash_offset() -> u32 {
    0x2000
}

fn default_tool_timeout_secs() -> Option<u64> {
    Some(300)
}

impl Default for FlashToolSettings {
    fn default() -> Self {
        Self {
            path: default_tool_path(),
            offset: default_flash_offset(),
            timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl FlashToolSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
