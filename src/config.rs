//! Configuration management for tenant-forge.
//!
//! Handles loading executor defaults from a TOML file; CLI flags take
//! precedence over file values.

use crate::error::{ForgeError, Result};
use crate::exec::ExecutorOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for tenant-forge.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Executor defaults.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Override for the state database path.
    #[serde(default)]
    pub state_db_path: Option<PathBuf>,
}

/// Executor defaults from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Budget for establishing each connection, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Budget for executing the script on each target, in seconds.
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    /// Maximum targets running at once; absent means unbounded.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_statement_timeout_secs() -> u64 {
    30
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            statement_timeout_secs: default_statement_timeout_secs(),
            max_concurrency: None,
        }
    }
}

impl ExecutorConfig {
    /// Converts the config into executor options.
    pub fn to_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            statement_timeout: Duration::from_secs(self.statement_timeout_secs),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tenant-forge")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ForgeError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
