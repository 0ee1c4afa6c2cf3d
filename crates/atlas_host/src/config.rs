// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host configuration.
//!
//! Read from a RON file; every field is optional:
//!
//! ```ron
//! (
//!     refresh_interval_ms: 250,
//!     max_cycles: Some(100),
//!     snapshot_path: Some("dashboard.json"),
//!     save_path: Some("dashboard.ron"),
//!     log_filter: "atlas_graph=debug,atlas_host=info",
//!     report_every: 20,
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file read when no path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "atlas.ron";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid RON for [`HostConfig`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings of the `atlas` host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Delay between execution cycles
    pub refresh_interval_ms: u64,
    /// Stop after this many cycles
    pub max_cycles: Option<u64>,
    /// Snapshot imported at startup; a demo graph is built otherwise
    pub snapshot_path: Option<PathBuf>,
    /// Where to export the graph on shutdown
    pub save_path: Option<PathBuf>,
    /// Default tracing directives, used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Log a summary every N cycles; 0 disables the summary
    pub report_every: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 100,
            max_cycles: None,
            snapshot_path: None,
            save_path: None,
            log_filter: "atlas_graph=info,atlas_host=info".to_string(),
            report_every: 50,
        }
    }
}

impl HostConfig {
    /// Parse and validate a RON document
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_ron(&content).map(Some)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::Invalid(
                "max_cycles must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}
