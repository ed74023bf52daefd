//! Mounted volume enumeration
//!
//! The bootloader shows up as a mass-storage drive. How mounted drive names
//! are listed is the only platform-specific part of detecting it, so each
//! platform gets its own [`VolumeLister`] and the polling logic in
//! [`watcher`] stays the same everywhere.

pub mod watcher;

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use sysinfo::Disks;
use tracing::{debug, trace};

use crate::errors::FlasherError;

/// Lists the labels of currently mounted volumes
pub trait VolumeLister: Send + Sync {
    fn list_volume_labels(&self) -> Result<Vec<String>, FlasherError>;
}

/// Treats every entry of a mount root directory as a volume label.
///
/// This matches how macOS (`/Volumes`) and desktop Linux automounters
/// (`/media/<user>`, `/run/media/<user>`) name mount points after the label.
#[derive(Debug, Clone)]
pub struct DirectoryVolumes {
    roots: Vec<PathBuf>,
}

impl DirectoryVolumes {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Mount roots used on this platform when none are configured
    pub fn platform_roots() -> Vec<PathBuf> {
        if cfg!(target_os = "macos") {
            return vec![PathBuf::from("/Volumes")];
        }

        let mut roots = Vec::new();
        if let Ok(user) = std::env::var("USER") {
            roots.push(PathBuf::from("/media").join(&user));
            roots.push(PathBuf::from("/run/media").join(&user));
        }
        roots.push(PathBuf::from("/media"));
        roots
    }
}

impl VolumeLister for DirectoryVolumes {
    fn list_volume_labels(&self) -> Result<Vec<String>, FlasherError> {
        let mut labels = Vec::new();

        for root in &self.roots {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                // Not every automounter root exists on every machine
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    trace!("Mount root {} does not exist", root.display());
                    continue;
                }
                Err(e) => {
                    return Err(FlasherError::VolumeQueryError(format!(
                        "{}: {}",
                        root.display(),
                        e
                    )))
                }
            };

            for entry in entries {
                let entry = entry?;
                labels.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        Ok(labels)
    }
}

/// Volume labels as reported by the OS disk list.
///
/// On Windows the disk name is the volume label of each logical drive;
/// drives that cannot be queried are left out of the list.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLabelVolumes;

impl VolumeLister for DiskLabelVolumes {
    fn list_volume_labels(&self) -> Result<Vec<String>, FlasherError> {
        let disks = Disks::new_with_refreshed_list();
        let labels: Vec<String> = disks
            .list()
            .iter()
            .map(|disk| disk.name().to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(labels)
    }
}

/// Volume lister for the current platform.
///
/// `roots` overrides the mount roots on Unix-like systems and is ignored on
/// Windows.
pub fn system_volume_lister(roots: Option<Vec<PathBuf>>) -> Arc<dyn VolumeLister> {
    if cfg!(windows) {
        debug!("Listing volumes by drive label");
        Arc::new(DiskLabelVolumes)
    } else {
        let roots = roots.unwrap_or_else(DirectoryVolumes::platform_roots);
        debug!("Listing volumes under {:?}", roots);
        Arc::new(DirectoryVolumes::new(roots))
    }
}
