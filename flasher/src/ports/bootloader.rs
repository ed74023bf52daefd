//! Soft bootloader request over the serial port
//!
//! Opening the CDC port at 1200 baud is not real communication: the running
//! firmware watches for that line coding and resets into the bootloader.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::FlasherError;

/// Asks a running board to reset into its bootloader
#[async_trait]
pub trait BootloaderRequester: Send + Sync {
    /// Trigger the reset on `port_path`. Failures are not retried.
    async fn request_bootloader(&self, port_path: &str) -> Result<(), FlasherError>;
}

/// The 1200-baud touch
#[derive(Debug, Clone)]
pub struct SerialBootloaderRequester {
    baud_rate: u32,
    hold: Duration,
}

impl SerialBootloaderRequester {
    pub fn new(baud_rate: u32, hold: Duration) -> Self {
        Self { baud_rate, hold }
    }
}

impl Default for SerialBootloaderRequester {
    fn default() -> Self {
        Self::new(1200, Duration::from_secs(1))
    }
}

fn connection_error(path: &str, reason: impl ToString) -> FlasherError {
    FlasherError::ConnectionError {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl BootloaderRequester for SerialBootloaderRequester {
    async fn request_bootloader(&self, port_path: &str) -> Result<(), FlasherError> {
        info!("Requesting bootloader on {} at {} baud", port_path, self.baud_rate);

        let path = port_path.to_string();
        let baud_rate = self.baud_rate;
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(path, baud_rate)
                .timeout(Duration::from_millis(100))
                .open()
        })
        .await
        .map_err(|e| connection_error(port_path, e))?
        .map_err(|e| connection_error(port_path, e))?;

        // The port is dropped on every exit from here, including when this
        // future is dropped mid-sleep.
        tokio::time::sleep(self.hold).await;
        drop(port);

        debug!("Closed {} after bootloader request", port_path);
        Ok(())
    }
}
