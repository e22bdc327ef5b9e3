use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of schema change a migration performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationType {
    /// Records the current schema without executing anything
    Baseline,
    /// Imperative DDL
    #[default]
    Migrate,
    /// State-based DDL computed from a desired schema
    MigrateSdl,
    /// Fork from a backup
    Branch,
    /// DML
    Data,
}

impl MigrationType {
    /// Baseline and Branch restart the sequence and version ordering
    pub fn resets_history(&self) -> bool {
        matches!(self, Self::Baseline | Self::Branch)
    }

    /// Whether a forced re-run over a Pending/Failed row may be honored
    pub fn allows_force(&self) -> bool {
        !matches!(self, Self::Data)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "BASELINE",
            Self::Migrate => "MIGRATE",
            Self::MigrateSdl => "MIGRATE_SDL",
            Self::Branch => "BRANCH",
            Self::Data => "DATA",
        }
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MigrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASELINE" => Ok(Self::Baseline),
            "MIGRATE" => Ok(Self::Migrate),
            "MIGRATE_SDL" => Ok(Self::MigrateSdl),
            "BRANCH" => Ok(Self::Branch),
            "DATA" => Ok(Self::Data),
            _ => Err(format!("Invalid migration type: {s}")),
        }
    }
}

/// Where a migration was submitted from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationSource {
    #[default]
    Ui,
    Vcs,
    Library,
}

impl MigrationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "UI",
            Self::Vcs => "VCS",
            Self::Library => "LIBRARY",
        }
    }
}

impl std::str::FromStr for MigrationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UI" => Ok(Self::Ui),
            "VCS" => Ok(Self::Vcs),
            "LIBRARY" => Ok(Self::Library),
            _ => Err(format!("Invalid migration source: {s}")),
        }
    }
}

/// Status of a migration history row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Pending,
    Done,
    Failed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for MigrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid migration status: {s}")),
        }
    }
}

/// Metadata describing one migration attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub release_version: String,
    /// Displayed version; semantic versions are `MAJOR.MINOR.PATCH`
    pub version: String,
    /// History namespace, normally the database name
    pub namespace: String,
    pub database: String,
    pub environment: String,
    pub source: MigrationSource,
    pub migration_type: MigrationType,
    pub description: String,
    pub creator: String,
    pub issue_id: Option<i64>,
    /// Re-run over a Pending/Failed row left by an interrupted attempt
    pub force: bool,
    pub use_semantic_version: bool,
    /// Appended to the stored semantic version so a version can be reused
    pub semantic_version_suffix: String,
    /// The statement creates the database, so there is nothing to dump first
    pub create_database: bool,
}

/// Durable record of one executed migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationHistory {
    pub id: i64,
    pub creator: String,
    pub created_ts: DateTime<Utc>,
    pub updater: String,
    pub updated_ts: DateTime<Utc>,
    pub release_version: String,
    pub namespace: String,
    pub sequence: i64,
    pub source: MigrationSource,
    pub migration_type: MigrationType,
    pub status: MigrationStatus,
    /// Displayed version, decoded from the stored key
    pub version: String,
    pub use_semantic_version: bool,
    pub semantic_version_suffix: String,
    pub description: String,
    pub statement: String,
    pub schema: String,
    pub schema_prev: String,
    pub execution_duration_ns: i64,
    pub issue_id: Option<i64>,
}

/// Filter for history lookups; every set field must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationHistoryFind {
    pub id: Option<i64>,
    pub database: Option<String>,
    pub source: Option<MigrationSource>,
    /// Displayed version; a semantic one matches every suffix it was stored with
    pub version: Option<String>,
    /// Read `version` as semantic instead of as an opaque string
    pub use_semantic_version: bool,
    /// Exact stored key, suffix included
    pub stored_version: Option<String>,
    pub limit: Option<usize>,
}
