//! Daemon configuration.
//!
//! Configuration is resolved in three layers, later layers winning:
//!
//! 1. Built-in defaults ([`DaemonConfig::default`]).
//! 2. A JSON file named by the `HATD_CONFIG` environment variable.
//! 3. Individual environment overrides (`HATD_MAX_PRIORITY`,
//!    `HATD_SUPERVISOR_INTERVAL_MS`, `HATD_BOARD`).
//!
//! # Example
//!
//! ```
//! use hatd_core::{BoardKind, DaemonConfig};
//!
//! let config: DaemonConfig = serde_json::from_str(r#"{ "board": "pro_hat" }"#).unwrap();
//! assert_eq!(config.board, BoardKind::ProHat);
//! assert_eq!(config.max_priority, 10);
//! config.validate().unwrap();
//! ```

use crate::{
    BoardKind, Result,
    constants::{
        DEFAULT_MAX_PRIORITY, DEFAULT_PROC_ROOT, DEFAULT_REQUEST_QUEUE,
        DEFAULT_SUPERVISOR_INTERVAL_MS,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the JSON configuration file.
pub const ENV_CONFIG_PATH: &str = "HATD_CONFIG";

/// Environment override for [`DaemonConfig::max_priority`].
pub const ENV_MAX_PRIORITY: &str = "HATD_MAX_PRIORITY";

/// Environment override for [`DaemonConfig::supervisor_interval_ms`].
pub const ENV_SUPERVISOR_INTERVAL_MS: &str = "HATD_SUPERVISOR_INTERVAL_MS";

/// Environment override for [`DaemonConfig::board`].
pub const ENV_BOARD: &str = "HATD_BOARD";

/// Configuration for a daemon instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Number of lock priority slots of the board service.
    pub max_priority: u8,

    /// Interval between liveness checks of lock holders, in milliseconds.
    pub supervisor_interval_ms: u64,

    /// Board served by this daemon.
    pub board: BoardKind,

    /// Mount point of the process table.
    pub proc_root: PathBuf,

    /// Capacity of the bus request queue.
    pub request_queue: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_priority: DEFAULT_MAX_PRIORITY,
            supervisor_interval_ms: DEFAULT_SUPERVISOR_INTERVAL_MS,
            board: BoardKind::default(),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            request_queue: DEFAULT_REQUEST_QUEUE,
        }
    }
}

impl DaemonConfig {
    /// Read a configuration from a JSON file.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Resolve the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded, an
    /// override cannot be parsed, or the result fails [`validate`](Self::validate).
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration using `lookup` in place of the environment.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(ENV_CONFIG_PATH) {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply individual environment overrides on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigValue`] or [`Error::UnknownBoard`] if an
    /// override cannot be parsed.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_MAX_PRIORITY) {
            self.max_priority = parse_value(ENV_MAX_PRIORITY, &value)?;
        }
        if let Some(value) = lookup(ENV_SUPERVISOR_INTERVAL_MS) {
            self.supervisor_interval_ms = parse_value(ENV_SUPERVISOR_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_BOARD) {
            self.board = value.parse()?;
        }
        Ok(())
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.max_priority == 0 {
            return Err(Error::Config("max_priority must be at least 1".to_string()));
        }
        if self.supervisor_interval_ms == 0 {
            return Err(Error::Config(
                "supervisor_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.request_queue == 0 {
            return Err(Error::Config(
                "request_queue must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Supervisor interval as a [`Duration`].
    #[must_use]
    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
