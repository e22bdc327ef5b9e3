//! # Schemaflow CLI
//!
//! Operator tooling: try file path templates against repository paths and
//! validate configuration files. Results are printed as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;

use schemaflow_core::config::{ConfigManager, LoggingConfig};
use schemaflow_core::logging::init_logging;
use schemaflow_core::migration::{parse_migration_info, parse_schema_file_info};

#[derive(Parser, Debug)]
#[command(name = "schemaflow")]
#[command(about = "Operator tooling for the schemaflow orchestration core")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Match a migration file path against a path template
    ParseMigration {
        /// Template, e.g. "{{ENV_NAME}}/{{DB_NAME}}/{{VERSION}}__{{TYPE}}.sql"
        #[arg(short, long)]
        template: String,
        /// Repository-relative file path
        #[arg(value_name = "PATH")]
        path: String,
        /// Accept templates without {{DB_NAME}}
        #[arg(long)]
        allow_omit_database_name: bool,
    },
    /// Match a schema snapshot file path against a schema path template
    ParseSchema {
        /// Base directory of the repository
        #[arg(short, long, default_value = "")]
        base_dir: String,
        /// Template, e.g. "{{ENV_NAME}}/.{{DB_NAME}}__LATEST.sql"
        #[arg(short, long)]
        template: String,
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Load and validate a configuration file plus SCHEMAFLOW__ overrides
    CheckConfig {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        ..Default::default()
    });
    debug!(command = ?cli.command, "Running command");

    let output = match &cli.command {
        Commands::ParseMigration {
            template,
            path,
            allow_omit_database_name,
        } => {
            let info = parse_migration_info(path, template, *allow_omit_database_name)
                .with_context(|| format!("failed to parse {path:?}"))?;
            json!({ "path": path, "matched": info.is_some(), "migration": info })
        }
        Commands::ParseSchema {
            base_dir,
            template,
            path,
        } => {
            let info = parse_schema_file_info(base_dir, template, path)
                .with_context(|| format!("failed to parse {path:?}"))?;
            json!({ "path": path, "matched": info.is_some(), "schema": info })
        }
        Commands::CheckConfig { file } => {
            let manager = ConfigManager::load(file.as_deref())
                .context("configuration is invalid")?;
            json!({
                "valid": true,
                "source": manager.source_path().map(|p| p.display().to_string()),
                "config": manager.config(),
            })
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}
