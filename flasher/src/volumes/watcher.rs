//! Waiting for the bootloader volume to mount

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::errors::FlasherError;
use crate::volumes::VolumeLister;

/// Polls mounted volumes for the bootloader's drive label
#[derive(Clone)]
pub struct MountWatcher {
    lister: Arc<dyn VolumeLister>,
    volume_label: String,
    poll_interval: Duration,
}

impl MountWatcher {
    pub fn new(lister: Arc<dyn VolumeLister>, volume_label: impl Into<String>) -> Self {
        Self {
            lister,
            volume_label: volume_label.into(),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn volume_label(&self) -> &str {
        &self.volume_label
    }

    /// Single snapshot check
    pub async fn is_mounted(&self) -> Result<bool, FlasherError> {
        let lister = Arc::clone(&self.lister);
        let labels = tokio::task::spawn_blocking(move || lister.list_volume_labels())
            .await
            .map_err(|e| FlasherError::VolumeQueryError(e.to_string()))??;
        debug!("Mounted drives: {:?}", labels);
        Ok(labels.iter().any(|label| label == &self.volume_label))
    }

    /// Wait up to `timeout` for the bootloader volume.
    ///
    /// Checks once right away, then every poll interval until the deadline.
    /// A zero timeout is a single check with no sleep. Returns `Ok(false)`
    /// when the volume never showed up; only failed OS queries are errors.
    pub async fn verify_bootloader_mounted(&self, timeout: Duration) -> Result<bool, FlasherError> {
        let deadline = Instant::now() + timeout;

        if self.is_mounted().await? {
            debug!("Found {}.", self.volume_label);
            return Ok(true);
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;

            if self.is_mounted().await? {
                debug!("Found {}.", self.volume_label);
                return Ok(true);
            }
        }

        debug!("{} not mounted within {:?}", self.volume_label, timeout);
        Ok(false)
    }
}
