//! Host configuration
//!
//! A small TOML file tunes the connection and log-tailing behaviour. Every
//! key is optional; missing keys fall back to the compiled-in defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use kubedeck_k8s::{CONNECT_RETRY_DELAY, ConnectOptions, MAX_CONNECT_RETRIES};
use kubedeck_logs::{MAX_INITIAL_LINES, MAX_POLL_LINES, POLL_INTERVAL, TailOptions};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Connection establishment settings
    #[serde(default)]
    pub connect: ConnectConfig,

    /// Log tailing settings
    #[serde(default)]
    pub logs: LogsConfig,
}

/// Connection establishment settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConnectConfig {
    /// Maximum sequential attempts per connect call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Log tailing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    /// Interval between polls for new lines, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Line cap per poll
    #[serde(default = "default_max_poll_lines")]
    pub max_poll_lines: i64,

    /// Line cap for the initial fetch when a tail opens
    #[serde(default = "default_initial_lines")]
    pub initial_lines: i64,
}

// Default value functions
fn default_max_retries() -> u32 {
    MAX_CONNECT_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    CONNECT_RETRY_DELAY.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL.as_millis() as u64
}

fn default_max_poll_lines() -> i64 {
    MAX_POLL_LINES
}

fn default_initial_lines() -> i64 {
    MAX_INITIAL_LINES
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            connect: ConnectConfig::default(),
            logs: LogsConfig::default(),
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_lines: default_max_poll_lines(),
            initial_lines: default_initial_lines(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Connect tunables for [`kubedeck_k8s::ConnectionManager`]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            max_retries: self.connect.max_retries,
            retry_delay: Duration::from_millis(self.connect.retry_delay_ms),
        }
    }

    /// Tail tunables for [`kubedeck_logs::LogTailController`]
    pub fn tail_options(&self) -> TailOptions {
        TailOptions {
            poll_interval: Duration::from_millis(self.logs.poll_interval_ms),
            max_poll_lines: self.logs.max_poll_lines,
        }
    }

    /// Line cap for the initial fetch when a tail opens
    pub fn initial_lines(&self) -> i64 {
        self.logs.initial_lines
    }
}
