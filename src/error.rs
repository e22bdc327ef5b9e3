//! # Error Types
//!
//! Crate-wide error enum plus the stable [`ErrorCode`] values persisted on
//! failed task check runs and surfaced to API consumers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::ghost::GhostError;
use crate::migration::path_parser::ParseError;
use crate::migration::MigrationError;
use crate::orchestration::errors::WorkflowError;
use crate::state_machine::StateMachineError;
use crate::task_check::registry::RegistryError;

/// Stable error codes persisted alongside failed check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    Internal,
    NotFound,
    Invalid,
    DbConnectionFailure,
    DbExecutionError,
    MigrationSchemaMissing,
    MigrationAlreadyApplied,
    MigrationOutOfOrder,
    MigrationPending,
    MigrationFailed,
    TaskCheckEmptyStatement,
    GhostConfigInvalid,
}

impl ErrorCode {
    /// Integer value stored in the `code` column
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Internal => 1,
            Self::NotFound => 2,
            Self::Invalid => 3,
            Self::DbConnectionFailure => 101,
            Self::DbExecutionError => 102,
            Self::MigrationSchemaMissing => 201,
            Self::MigrationAlreadyApplied => 202,
            Self::MigrationOutOfOrder => 203,
            Self::MigrationPending => 204,
            Self::MigrationFailed => 205,
            Self::TaskCheckEmptyStatement => 301,
            Self::GhostConfigInvalid => 401,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

#[derive(Debug, Error)]
pub enum SchemaflowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Driver error ({code:?}): {message}")]
    DriverError { code: ErrorCode, message: String },
    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("Migration path error: {0}")]
    Parser(#[from] ParseError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("gh-ost configuration error: {0}")]
    Ghost(#[from] GhostError),
    #[error("Task check error: {0}")]
    TaskCheck(String),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchemaflowError {
    /// Driver failure carrying an explicit code
    pub fn driver(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::DriverError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Code recorded when this error fails a task check run
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DriverError { code, .. } => *code,
            Self::Migration(err) => err.code(),
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Parser(_) | Self::Workflow(_) | Self::StateTransition(_) => ErrorCode::Invalid,
            Self::DatabaseError(_) => ErrorCode::DbExecutionError,
            Self::Ghost(_) => ErrorCode::GhostConfigInvalid,
            Self::TaskCheck(_)
            | Self::Registry(_)
            | Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<sqlx::Error> for SchemaflowError {
    fn from(err: sqlx::Error) -> Self {
        SchemaflowError::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchemaflowError>;
