//! Engine configuration loaded from a TOML file.
//!
//! Every field has a default, so projtree runs without a config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::reconcile::DEFAULT_ORPHAN_BUFFER;

/// Top-level configuration.
///
/// Call [`Config::load`] to read from a TOML path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ops: OpsConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    /// - [`CoreError::Io`] for other read failures.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            _ => CoreError::Io(e),
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }
}

/// Where the engine lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Folder holding `projects/`, `images/` and `tmp/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// File operation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    /// Upper bound for any single blocking filesystem call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl OpsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Reconciler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// How many orphaned `Created` events are kept for a retry.
    #[serde(default = "default_orphan_buffer")]
    pub orphan_buffer: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            orphan_buffer: default_orphan_buffer(),
        }
    }
}

/// Log output settings for frontends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file; empty means `<root>/projtree.log`.
    #[serde(default)]
    pub file: String,
}

impl LoggingConfig {
    /// Resolves the log file location for a layout root.
    pub fn file_path(&self, root: &Path) -> PathBuf {
        if self.file.is_empty() {
            root.join("projtree.log")
        } else {
            PathBuf::from(&self.file)
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_orphan_buffer() -> usize {
    DEFAULT_ORPHAN_BUFFER
}

fn default_log_level() -> String {
    "info".to_string()
}
