//! Configuration Loader
//!
//! Layers an optional configuration file (TOML, YAML or JSON, detected by
//! extension) under `SCHEMAFLOW__SECTION__KEY` environment overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::SchemaflowConfig;

/// Prefix of environment overrides, e.g. `SCHEMAFLOW__SCHEDULER__INTERVAL_MS`
pub const ENV_PREFIX: &str = "SCHEMAFLOW";

/// Loaded and validated configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: SchemaflowConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string());

        let raw = builder
            .build()
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?;
        let config: SchemaflowConfig = raw
            .try_deserialize()
            .map_err(ConfigurationError::deserialize_error)?;

        Self::from_config(config, path.map(Path::to_path_buf))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(
        config: SchemaflowConfig,
        source_path: Option<PathBuf>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        debug!(
            interval_ms = config.scheduler.interval_ms,
            instance_max_connections = config.scheduler.instance_max_connections,
            max_concurrent_checks = config.scheduler.max_concurrent_checks,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_path,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SchemaflowConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}
