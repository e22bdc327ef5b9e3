//! # Migration Execution
//!
//! The contract every engine follows to apply one migration and keep a
//! crash-recoverable history:
//!
//! 1. dump the pre-migration schema (skipped when the statement creates the database)
//! 2. pre-check the history for the version and insert a PENDING row
//! 3. execute the statement
//! 4. dump the post-migration schema
//! 5. mark the row DONE or FAILED, even when step 3 failed
//!
//! Engines provide the history hooks through [`executor::MigrationExecutor`];
//! [`executor::execute_migration`] runs the sequence.

pub mod executor;
pub mod path_parser;
pub mod postgres;
pub mod version;

use thiserror::Error;

use crate::error::ErrorCode;

pub use executor::{execute_migration, format_error, MigrationExecutor, MigrationOutcome};
pub use path_parser::{parse_migration_info, parse_schema_file_info, ParseError, SchemaFileInfo};
pub use version::{from_stored_version, to_stored_version, DecodedVersion};

/// Unique index over (namespace, version) on the history table
pub const NAMESPACE_VERSION_INDEX: &str = "idx_migration_history_unique_namespace_version";
/// Unique index over (namespace, sequence) on the history table
pub const NAMESPACE_SEQUENCE_INDEX: &str = "idx_migration_history_unique_namespace_sequence";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("database {database:?} has already applied version {version}")]
    AlreadyApplied { database: String, version: String },

    #[error("database {database:?} has already applied version {version} by issue {issue_id:?}")]
    AppliedByOtherIssue {
        database: String,
        version: String,
        issue_id: Option<i64>,
    },

    #[error("database {database:?} version {version} migration is already in progress")]
    InProgress { database: String, version: String },

    #[error("database {database:?} version {version} migration has failed, please check your database to make sure things are fine and then start a new migration using a new version")]
    PreviouslyFailed { database: String, version: String },

    #[error("database {database:?} has already applied version {applied} which >= {requested}")]
    OutOfOrder {
        database: String,
        applied: String,
        requested: String,
    },

    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("invalid stored version {stored_version:?}: {reason}")]
    InvalidStoredVersion {
        stored_version: String,
        reason: String,
    },

    #[error("version has already been applied")]
    VersionAlreadyApplied,

    #[error("concurrent migration")]
    ConcurrentMigration,

    #[error("migration history is not set up on instance {instance}")]
    SchemaMissing { instance: String },

    #[error("failed to execute migration: {message}")]
    Execution { message: String },
}

impl MigrationError {
    /// Stable code persisted with failed checks and task runs
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyApplied { .. } => ErrorCode::MigrationAlreadyApplied,
            Self::AppliedByOtherIssue { .. } | Self::PreviouslyFailed { .. } => {
                ErrorCode::MigrationFailed
            }
            Self::InProgress { .. } => ErrorCode::MigrationPending,
            Self::OutOfOrder { .. } => ErrorCode::MigrationOutOfOrder,
            Self::InvalidVersion { .. } => ErrorCode::Invalid,
            Self::InvalidStoredVersion { .. } => ErrorCode::Internal,
            Self::VersionAlreadyApplied | Self::ConcurrentMigration | Self::Execution { .. } => {
                ErrorCode::DbExecutionError
            }
            Self::SchemaMissing { .. } => ErrorCode::MigrationSchemaMissing,
        }
    }
}
