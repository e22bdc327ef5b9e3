//! # Schemaflow Configuration
//!
//! Typed configuration for the orchestration core. Every section has
//! defaults matching the production constants, so an empty configuration is
//! valid; files and environment variables only override what they name.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use schemaflow_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(Some("config/schemaflow.toml".as_ref()))?;
//! let interval = manager.config().scheduler.interval();
//! let cap = manager.config().scheduler.instance_max_connections;
//! # let _ = (interval, cap);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaflowConfig {
    /// Task check scheduler settings
    pub scheduler: SchedulerConfig,

    /// Online schema change (gh-ost) settings
    pub ghost: GhostSettings,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl SchemaflowConfig {
    /// Validate value ranges across all sections
    pub fn validate(&self) -> ConfigResult<()> {
        self.scheduler.validate()?;
        self.ghost.validate()?;
        Ok(())
    }
}

/// Task check scheduler configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Polling interval in milliseconds
    pub interval_ms: u64,
    /// Outstanding check connections allowed per instance
    pub instance_max_connections: u32,
    /// Global bound on concurrently running check workers
    pub max_concurrent_checks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: constants::scheduler::DEFAULT_INTERVAL_MS,
            instance_max_connections: constants::scheduler::INSTANCE_MAXIMUM_CONNECTION_NUMBER,
            max_concurrent_checks: constants::scheduler::DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.interval_ms",
                self.interval_ms,
                "polling interval must be greater than zero",
            ));
        }
        if self.instance_max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.instance_max_connections",
                self.instance_max_connections,
                "at least one connection per instance is required to run checks",
            ));
        }
        if self.max_concurrent_checks == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.max_concurrent_checks",
                self.max_concurrent_checks,
                "worker pool must allow at least one check",
            ));
        }
        Ok(())
    }
}

/// gh-ost adapter configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GhostSettings {
    /// Base of the replica server id range reserved for gh-ost runs
    pub server_id_offset: u32,
    /// Directory holding the per-run control sockets
    pub socket_dir: PathBuf,
    /// Directory holding the per-run postpone-cutover flag files
    pub flag_dir: PathBuf,
    pub chunk_size: i64,
    pub max_lag_millis: i64,
    pub dml_batch_size: i64,
    pub cut_over_lock_timeout_seconds: i64,
    pub heartbeat_interval_millis: i64,
    pub default_retries: i64,
}

impl Default for GhostSettings {
    fn default() -> Self {
        Self {
            server_id_offset: constants::ghost::DEFAULT_SERVER_ID_OFFSET,
            socket_dir: PathBuf::from(constants::ghost::DEFAULT_RUNTIME_DIR),
            flag_dir: PathBuf::from(constants::ghost::DEFAULT_RUNTIME_DIR),
            chunk_size: constants::ghost::DEFAULT_CHUNK_SIZE,
            max_lag_millis: constants::ghost::DEFAULT_MAX_LAG_MILLIS,
            dml_batch_size: constants::ghost::DEFAULT_DML_BATCH_SIZE,
            cut_over_lock_timeout_seconds: constants::ghost::DEFAULT_CUT_OVER_LOCK_TIMEOUT_SECONDS,
            heartbeat_interval_millis: constants::ghost::DEFAULT_HEARTBEAT_INTERVAL_MILLIS,
            default_retries: constants::ghost::DEFAULT_RETRIES,
        }
    }
}

impl GhostSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.server_id_offset == 0 {
            return Err(ConfigurationError::invalid_value(
                "ghost.server_id_offset",
                self.server_id_offset,
                "server id 0 is reserved by MySQL replication",
            ));
        }
        if self.chunk_size <= 0 {
            return Err(ConfigurationError::invalid_value(
                "ghost.chunk_size",
                self.chunk_size,
                "chunk size must be positive",
            ));
        }
        Ok(())
    }
}

/// Output format of the console log layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
