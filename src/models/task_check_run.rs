use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::catalog::DbType;
use crate::error::ErrorCode;

/// Kind of automated validation attached to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCheckType {
    DatabaseConnect,
    InstanceMigrationSchema,
    StatementAdvise,
    StatementSyntax,
    StatementType,
    GhostSync,
    PitrMysql,
    IssueLgtm,
}

impl TaskCheckType {
    pub const ALL: [TaskCheckType; 8] = [
        Self::DatabaseConnect,
        Self::InstanceMigrationSchema,
        Self::StatementAdvise,
        Self::StatementSyntax,
        Self::StatementType,
        Self::GhostSync,
        Self::PitrMysql,
        Self::IssueLgtm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseConnect => "DATABASE_CONNECT",
            Self::InstanceMigrationSchema => "INSTANCE_MIGRATION_SCHEMA",
            Self::StatementAdvise => "STATEMENT_ADVISE",
            Self::StatementSyntax => "STATEMENT_SYNTAX",
            Self::StatementType => "STATEMENT_TYPE",
            Self::GhostSync => "GHOST_SYNC",
            Self::PitrMysql => "PITR_MYSQL",
            Self::IssueLgtm => "ISSUE_LGTM",
        }
    }
}

impl fmt::Display for TaskCheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a check run
///
/// `Queued` is stored as `RUNNING`: the row waits for the scheduler, it is not
/// necessarily executing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskCheckRunStatus {
    #[default]
    #[serde(rename = "RUNNING")]
    Queued,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TaskCheckRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Severity of a single check finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCheckStatus {
    Success,
    Warn,
    Error,
}

/// One finding reported by a check executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheckResult {
    pub status: TaskCheckStatus,
    pub namespace: String,
    pub code: i32,
    pub title: String,
    pub content: String,
}

impl TaskCheckResult {
    pub fn success(namespace: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            status: TaskCheckStatus::Success,
            namespace: namespace.into(),
            code: ErrorCode::Ok.as_i32(),
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn error(
        namespace: impl Into<String>,
        code: ErrorCode,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            status: TaskCheckStatus::Error,
            namespace: namespace.into(),
            code: code.as_i32(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Result payload persisted on a finished check run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCheckRunResultPayload {
    /// Error detail of a failed run
    pub detail: String,
    pub result_list: Vec<TaskCheckResult>,
}

/// Input of statement syntax and statement type checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementCheckPayload {
    pub statement: String,
    pub db_type: DbType,
    pub charset: String,
    pub collation: String,
}

/// Input of the SQL review check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementAdvisePayload {
    pub statement: String,
    pub db_type: DbType,
    pub charset: String,
    pub collation: String,
    /// Effective review policy of the task's environment
    pub policy_id: i64,
}

/// Typed check input, selected by [`TaskCheckType`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCheckPayload {
    #[default]
    Empty,
    StatementAdvise(StatementAdvisePayload),
    StatementSyntax(StatementCheckPayload),
    StatementType(StatementCheckPayload),
}

impl TaskCheckPayload {
    /// Decode a stored payload for the given check type
    pub fn decode(check_type: TaskCheckType, raw: &str) -> serde_json::Result<Self> {
        Ok(match check_type {
            TaskCheckType::StatementAdvise => Self::StatementAdvise(serde_json::from_str(raw)?),
            TaskCheckType::StatementSyntax => Self::StatementSyntax(serde_json::from_str(raw)?),
            TaskCheckType::StatementType => Self::StatementType(serde_json::from_str(raw)?),
            _ => Self::Empty,
        })
    }

    /// Encode the stored form; checks without input store an empty string
    pub fn encode(&self) -> serde_json::Result<String> {
        match self {
            Self::Empty => Ok(String::new()),
            Self::StatementAdvise(p) => serde_json::to_string(p),
            Self::StatementSyntax(p) | Self::StatementType(p) => serde_json::to_string(p),
        }
    }

    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::StatementAdvise(p) => Some(&p.statement),
            Self::StatementSyntax(p) | Self::StatementType(p) => Some(&p.statement),
        }
    }
}

/// One automated validation attached to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCheckRun {
    pub id: i64,
    pub task_id: i64,
    pub creator_id: i64,
    pub created_ts: DateTime<Utc>,
    pub updater_id: i64,
    pub updated_ts: DateTime<Utc>,
    pub check_type: TaskCheckType,
    pub status: TaskCheckRunStatus,
    pub code: ErrorCode,
    pub payload: TaskCheckPayload,
    pub result: Option<TaskCheckRunResultPayload>,
}

/// New TaskCheckRun for creation; rows start `Queued`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCheckRunCreate {
    pub task_id: i64,
    pub creator_id: i64,
    pub check_type: TaskCheckType,
    pub payload: TaskCheckPayload,
}

/// Terminal outcome written by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCheckRunStatusPatch {
    pub id: i64,
    pub updater_id: i64,
    pub status: TaskCheckRunStatus,
    pub code: ErrorCode,
    pub result: TaskCheckRunResultPayload,
}

/// Filter for check run lookups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCheckRunFind {
    pub task_id: Option<i64>,
    pub status_list: Option<Vec<TaskCheckRunStatus>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_is_stored_as_running() {
        assert_eq!(
            serde_json::to_string(&TaskCheckRunStatus::Queued).unwrap(),
            "\"RUNNING\""
        );
        let parsed: TaskCheckRunStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(parsed, TaskCheckRunStatus::Queued);
        assert!(!parsed.is_terminal());
    }

    #[test]
    fn test_payload_decode_by_type() {
        let raw = r#"{"statement":"SELECT 1","db_type":"MYSQL","charset":"utf8mb4","collation":"","policy_id":7}"#;
        let payload = TaskCheckPayload::decode(TaskCheckType::StatementAdvise, raw).unwrap();
        match &payload {
            TaskCheckPayload::StatementAdvise(p) => assert_eq!(p.policy_id, 7),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(payload.statement(), Some("SELECT 1"));

        assert_eq!(
            TaskCheckPayload::decode(TaskCheckType::DatabaseConnect, "").unwrap(),
            TaskCheckPayload::Empty
        );
        assert!(TaskCheckPayload::decode(TaskCheckType::StatementSyntax, "").is_err());
    }

    #[test]
    fn test_result_payload_serde() {
        let payload = TaskCheckRunResultPayload {
            detail: String::new(),
            result_list: vec![TaskCheckResult::success("core", "OK", "connected")],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["result_list"][0]["status"], "SUCCESS");
        assert_eq!(json["result_list"][0]["code"], 0);
    }
}
