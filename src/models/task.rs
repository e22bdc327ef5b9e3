use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::migration::MigrationType;
use super::task_run::TaskRun;
use crate::state_machine::TaskStatus;

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    General,
    DatabaseCreate,
    SchemaBaseline,
    SchemaUpdate,
    SchemaUpdateSdl,
    SchemaUpdateGhostSync,
    SchemaUpdateGhostCutover,
    DataUpdate,
    RestorePitrRestore,
    RestorePitrCutover,
}

impl TaskType {
    /// Task types that carry a statement checked before rollout
    pub fn is_statement_change(&self) -> bool {
        matches!(
            self,
            Self::SchemaUpdate | Self::SchemaUpdateSdl | Self::DataUpdate | Self::SchemaUpdateGhostSync
        )
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, Self::SchemaUpdateGhostSync | Self::SchemaUpdateGhostCutover)
    }

    /// Migration type recorded in history when this task executes
    pub fn migration_type(&self) -> Option<MigrationType> {
        match self {
            Self::SchemaBaseline => Some(MigrationType::Baseline),
            Self::SchemaUpdate | Self::SchemaUpdateGhostCutover | Self::DatabaseCreate => {
                Some(MigrationType::Migrate)
            }
            Self::SchemaUpdateSdl => Some(MigrationType::MigrateSdl),
            Self::DataUpdate => Some(MigrationType::Data),
            Self::RestorePitrCutover => Some(MigrationType::Branch),
            Self::General | Self::SchemaUpdateGhostSync | Self::RestorePitrRestore => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde names are the canonical spelling
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        f.write_str(&name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralPayload {
    pub statement: String,
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseCreatePayload {
    pub project_id: i64,
    pub database_name: String,
    pub statement: String,
    pub character_set: String,
    pub collation: String,
    pub skipped: bool,
}

/// Payload of baseline, schema update (imperative or SDL) and data update tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementPayload {
    pub statement: String,
    pub rollback_statement: Option<String>,
    pub schema_version: String,
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostSyncPayload {
    pub statement: String,
    pub schema_version: String,
    pub skipped: bool,
}

/// Cutover, and PITR cutover, carry nothing but the skip flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoverPayload {
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitrRestorePayload {
    pub project_id: i64,
    pub database_name: Option<String>,
    pub target_instance_id: Option<i64>,
    pub backup_id: Option<i64>,
    pub point_in_time_ts: Option<i64>,
    pub skipped: bool,
}

/// Typed task payload, selected by [`TaskType`] at the persistence boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPayload {
    General(GeneralPayload),
    DatabaseCreate(DatabaseCreatePayload),
    Statement(StatementPayload),
    GhostSync(GhostSyncPayload),
    Cutover(CutoverPayload),
    PitrRestore(PitrRestorePayload),
}

impl TaskPayload {
    /// Decode a stored payload for the given task type
    ///
    /// An empty string decodes to the type's default payload.
    pub fn decode(task_type: TaskType, raw: &str) -> serde_json::Result<Self> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        Ok(match task_type {
            TaskType::General => Self::General(serde_json::from_str(raw)?),
            TaskType::DatabaseCreate => Self::DatabaseCreate(serde_json::from_str(raw)?),
            TaskType::SchemaBaseline
            | TaskType::SchemaUpdate
            | TaskType::SchemaUpdateSdl
            | TaskType::DataUpdate => Self::Statement(serde_json::from_str(raw)?),
            TaskType::SchemaUpdateGhostSync => Self::GhostSync(serde_json::from_str(raw)?),
            TaskType::SchemaUpdateGhostCutover | TaskType::RestorePitrCutover => {
                Self::Cutover(serde_json::from_str(raw)?)
            }
            TaskType::RestorePitrRestore => Self::PitrRestore(serde_json::from_str(raw)?),
        })
    }

    /// Encode the stored form, which carries no variant tag
    pub fn encode(&self) -> serde_json::Result<String> {
        match self {
            Self::General(p) => serde_json::to_string(p),
            Self::DatabaseCreate(p) => serde_json::to_string(p),
            Self::Statement(p) => serde_json::to_string(p),
            Self::GhostSync(p) => serde_json::to_string(p),
            Self::Cutover(p) => serde_json::to_string(p),
            Self::PitrRestore(p) => serde_json::to_string(p),
        }
    }

    /// Statement the task applies, if its type carries one
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::General(p) => Some(&p.statement),
            Self::DatabaseCreate(p) => Some(&p.statement),
            Self::Statement(p) => Some(&p.statement),
            Self::GhostSync(p) => Some(&p.statement),
            Self::Cutover(_) | Self::PitrRestore(_) => None,
        }
    }

    pub fn rollback_statement(&self) -> Option<&str> {
        match self {
            Self::Statement(p) => p.rollback_statement.as_deref(),
            _ => None,
        }
    }

    pub fn schema_version(&self) -> Option<&str> {
        match self {
            Self::Statement(p) => Some(&p.schema_version),
            Self::GhostSync(p) => Some(&p.schema_version),
            _ => None,
        }
    }

    pub fn skipped(&self) -> bool {
        match self {
            Self::General(p) => p.skipped,
            Self::DatabaseCreate(p) => p.skipped,
            Self::Statement(p) => p.skipped,
            Self::GhostSync(p) => p.skipped,
            Self::Cutover(p) => p.skipped,
            Self::PitrRestore(p) => p.skipped,
        }
    }
}

/// One unit of schema or data change against one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub pipeline_id: i64,
    pub stage_id: i64,
    pub instance_id: i64,
    pub database_id: Option<i64>,
    pub name: String,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub payload: TaskPayload,
    /// Unix seconds before which the runner must not start the task
    pub earliest_allowed_ts: i64,
    pub creator_id: i64,
    pub created_ts: DateTime<Utc>,
    pub updated_ts: DateTime<Utc>,
    /// Attempts in creation order
    pub task_runs: Vec<TaskRun>,
}

impl Task {
    /// Most recent attempt, if the task ever ran
    pub fn latest_run(&self) -> Option<&TaskRun> {
        self.task_runs.iter().max_by_key(|run| (run.created_ts, run.id))
    }

    pub fn statement(&self) -> Option<&str> {
        self.payload.statement()
    }
}

/// New Task for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreate {
    pub name: String,
    pub instance_id: i64,
    pub database_id: Option<i64>,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub payload: TaskPayload,
    pub earliest_allowed_ts: i64,
    /// Target database name; used to scope gh-ost runtime files
    pub database_name: String,
}

/// Compare-and-set status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatusPatch {
    pub id: i64,
    /// Status the caller observed; the patch fails if the row moved on
    pub expected: TaskStatus,
    pub status: TaskStatus,
    pub updater_id: i64,
}

/// Filter for task lookups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFind {
    pub pipeline_id: Option<i64>,
    pub stage_id: Option<i64>,
    pub status_list: Option<Vec<TaskStatus>>,
}
