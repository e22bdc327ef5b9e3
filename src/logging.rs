//! # Structured Logging Module
//!
//! Console logging for the scheduler loop and migration execution paths,
//! either human readable or JSON lines.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging
///
/// `RUST_LOG` wins over the configured level. Safe to call more than once and
/// safe to call when the embedding application already installed a global
/// subscriber.
pub fn init_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let layer = match config.format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            level = %config.level,
            format = ?config.format,
            "Structured logging initialized"
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
        });
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
