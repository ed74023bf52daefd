//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the flasher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Parse `--key=value` and `--flag` arguments into key/value pairs.
///
/// Standalone flags map to `"true"`; anything not starting with `-` is
/// ignored.
pub fn parse_cli_args<I, S>(args: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        if !arg.starts_with('-') {
            continue;
        }
        if let Some((key, value)) = arg.split_once('=') {
            parsed.push((key.trim_start_matches('-').to_string(), value.to_string()));
        } else {
            parsed.push((arg.trim_start_matches('-').to_string(), "true".to_string()));
        }
    }

    parsed
}
