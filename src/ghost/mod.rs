//! # Online Schema Change Adapter
//!
//! Builds the configuration handed to gh-ost for a `SCHEMA_UPDATE_GHOST_SYNC`
//! task. The tool itself is an external collaborator behind [`GhostEngine`];
//! this module only derives the per-run values that must never collide between
//! concurrent runs: the replica server id and the socket/flag file paths.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::config::GhostSettings;
use crate::driver::InstanceMeta;
use crate::error::Result;
use crate::models::{Database, Instance, Task, TaskPayload, TaskType};

/// Account present only on AWS RDS MySQL instances
const RDS_ADMIN_USER: &str = "'rdsadmin'@'localhost'";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GhostError {
    #[error("statement does not name a table explicitly: {statement:?}")]
    MissingTableName { statement: String },

    #[error("task {task_id} is not a gh-ost sync task (type {task_type})")]
    UnsupportedTask { task_id: i64, task_type: TaskType },

    #[error("task {task_id} has no database")]
    MissingDatabase { task_id: i64 },

    #[error("server id overflow: offset {offset} + task {task_id}")]
    ServerIdOverflow { offset: u32, task_id: i64 },
}

/// Everything gh-ost needs for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    /// ALTER statement with the `ALTER TABLE <name>` head removed
    pub alter_statement: String,
    /// Replica id gh-ost registers with; unique per task
    pub server_id: u32,
    pub socket_file: PathBuf,
    /// While this file exists gh-ost postpones the cutover
    pub postpone_flag_file: PathBuf,
    pub is_aws_rds: bool,
    /// Skip the binlog_format check; RDS does not allow changing it
    pub assume_rbr: bool,
    pub chunk_size: i64,
    pub max_lag_millis: i64,
    pub dml_batch_size: i64,
    pub cut_over_lock_timeout_seconds: i64,
    pub heartbeat_interval_millis: i64,
    pub default_retries: i64,
    /// Dry run; nothing on the target changes
    pub noop: bool,
}

/// The external online schema change engine
#[async_trait]
pub trait GhostEngine: Send + Sync {
    /// Validate the configuration against the target without migrating
    async fn validate(&self, config: &GhostConfig) -> Result<()>;

    /// Run the migration up to the postponed cutover
    async fn run(&self, config: &GhostConfig) -> Result<()>;
}

fn alter_table_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*ALTER\s+TABLE\s+(?:`?[\w$]+`?\s*\.\s*)?`?([\w$]+)`?\s*(.*?)\s*;?\s*$").ok()
    })
    .as_ref()
}

/// Extract the table an ALTER statement targets
pub fn table_name_from_statement(statement: &str) -> std::result::Result<String, GhostError> {
    alter_table_regex()
        .and_then(|re| re.captures(statement))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GhostError::MissingTableName {
            statement: statement.to_string(),
        })
}

fn alter_clause(statement: &str) -> String {
    alter_table_regex()
        .and_then(|re| re.captures(statement))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Replica server id for a task
pub fn server_id(offset: u32, task_id: i64) -> std::result::Result<u32, GhostError> {
    u32::try_from(task_id)
        .ok()
        .and_then(|id| offset.checked_add(id))
        .ok_or(GhostError::ServerIdOverflow { offset, task_id })
}

fn runtime_file_stem(task_id: i64, database_id: i64, database_name: &str, table_name: &str) -> String {
    format!("gh-ost.{task_id}.{database_id}.{database_name}.{table_name}")
}

/// Control socket path, unique per (task, database, table)
pub fn socket_file(dir: &Path, task_id: i64, database_id: i64, database_name: &str, table_name: &str) -> PathBuf {
    dir.join(format!(
        "{}.sock",
        runtime_file_stem(task_id, database_id, database_name, table_name)
    ))
}

/// Postpone-cutover flag path, unique per (task, database, table)
pub fn postpone_flag_file(
    dir: &Path,
    task_id: i64,
    database_id: i64,
    database_name: &str,
    table_name: &str,
) -> PathBuf {
    dir.join(format!(
        "{}.postponeFlag",
        runtime_file_stem(task_id, database_id, database_name, table_name)
    ))
}

/// AWS RDS exposes an `rdsadmin` account holding SUPER
pub fn is_aws_rds(meta: &InstanceMeta) -> bool {
    meta.user_list.iter().any(|user| {
        user.name == RDS_ADMIN_USER
            && user
                .grant
                .lines()
                .any(|grant| grant.to_ascii_uppercase().contains("SUPER"))
    })
}

/// Assemble the gh-ost configuration for a sync task
pub fn build_ghost_config(
    task: &Task,
    database: &Database,
    instance: &Instance,
    instance_meta: &InstanceMeta,
    settings: &GhostSettings,
    noop: bool,
) -> Result<GhostConfig> {
    let statement = match &task.payload {
        TaskPayload::GhostSync(payload) if task.task_type == TaskType::SchemaUpdateGhostSync => {
            payload.statement.as_str()
        }
        _ => {
            return Err(GhostError::UnsupportedTask {
                task_id: task.id,
                task_type: task.task_type,
            }
            .into())
        }
    };
    let database_id = task
        .database_id
        .ok_or(GhostError::MissingDatabase { task_id: task.id })?;

    let table = table_name_from_statement(statement)?;
    let is_aws_rds = is_aws_rds(instance_meta);

    let config = GhostConfig {
        host: instance.host.clone(),
        port: instance.port.clone(),
        user: instance.username.clone(),
        password: instance.password.clone(),
        database: database.name.clone(),
        alter_statement: alter_clause(statement),
        server_id: server_id(settings.server_id_offset, task.id)?,
        socket_file: socket_file(&settings.socket_dir, task.id, database_id, &database.name, &table),
        postpone_flag_file: postpone_flag_file(
            &settings.flag_dir,
            task.id,
            database_id,
            &database.name,
            &table,
        ),
        table,
        is_aws_rds,
        assume_rbr: is_aws_rds,
        chunk_size: settings.chunk_size,
        max_lag_millis: settings.max_lag_millis,
        dml_batch_size: settings.dml_batch_size,
        cut_over_lock_timeout_seconds: settings.cut_over_lock_timeout_seconds,
        heartbeat_interval_millis: settings.heartbeat_interval_millis,
        default_retries: settings.default_retries,
        noop,
    };

    debug!(
        task_id = task.id,
        table = %config.table,
        server_id = config.server_id,
        is_aws_rds = config.is_aws_rds,
        "Built gh-ost configuration"
    );
    Ok(config)
}
