//! External flashing tool invocation

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::errors::FlasherError;

/// Writes a firmware image to a board in bootloader mode
#[async_trait]
pub trait FlashTool: Send + Sync {
    /// Flash `firmware_path` to the board at `port_path`.
    ///
    /// Fails with [`FlasherError::FlashToolFailed`] when the tool exits
    /// nonzero and [`FlasherError::FlashToolError`] when it could not run.
    async fn flash(&self, port_path: &str, firmware_path: &Path) -> Result<(), FlasherError>;
}

/// Runs `bossac` with a fixed argument template.
///
/// Only the exit code is looked at. Output is captured for the debug log.
#[derive(Debug, Clone)]
pub struct BossacInvoker {
    tool_path: PathBuf,
    offset: u32,
    timeout: Option<Duration>,
}

impl BossacInvoker {
    pub fn new(tool_path: impl Into<PathBuf>, offset: u32, timeout: Option<Duration>) -> Self {
        Self {
            tool_path: tool_path.into(),
            offset,
            timeout,
        }
    }

    /// Info, debug, port, USB mode, offset, write, verify, image, reset
    pub fn args(&self, port_path: &str, firmware_path: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            "-d".into(),
            format!("--port={}", port_path).into(),
            "-U".into(),
            "-i".into(),
            format!("--offset={:#x}", self.offset).into(),
            "-w".into(),
            "-v".into(),
            firmware_path.as_os_str().to_owned(),
            "-R".into(),
        ]
    }

    fn command(&self, port_path: &str, firmware_path: &Path) -> Command {
        let mut cmd = Command::new(&self.tool_path);
        cmd.args(self.args(port_path, firmware_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

impl Default for BossacInvoker {
    fn default() -> Self {
        Self::new("bossac", 0x2000, Some(Duration::from_secs(300)))
    }
}

#[async_trait]
impl FlashTool for BossacInvoker {
    async fn flash(&self, port_path: &str, firmware_path: &Path) -> Result<(), FlasherError> {
        let mut cmd = self.command(port_path, firmware_path);
        debug!("Running command {:?}", cmd.as_std());

        let launch_error = |e: std::io::Error| {
            FlasherError::FlashToolError(format!(
                "failed to run {}: {}",
                self.tool_path.display(),
                e
            ))
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    FlasherError::FlashToolError(format!(
                        "{} timed out after {:?}",
                        self.tool_path.display(),
                        limit
                    ))
                })?
                .map_err(launch_error)?,
            None => cmd.output().await.map_err(launch_error)?,
        };

        debug!(
            "Flashing process results: status: {}, stdout: {}, stderr: {}",
            output.status,
            String::from_utf8_lossy(&output.stdout).trim(),
            String::from_utf8_lossy(&output.stderr).trim()
        );

        match output.status.code() {
            Some(0) => {
                info!("Flashed {} to {}", firmware_path.display(), port_path);
                Ok(())
            }
            Some(code) => {
                error!("{} exited with code {}", self.tool_path.display(), code);
                Err(FlasherError::FlashToolFailed(code))
            }
            None => Err(FlasherError::FlashToolError(format!(
                "{} terminated without an exit code",
                self.tool_path.display()
            ))),
        }
    }
}
