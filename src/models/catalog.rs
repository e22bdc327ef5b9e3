//! Catalog read models consumed by check composition and the gh-ost adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DbType {
    #[serde(rename = "MYSQL")]
    MySql,
    #[serde(rename = "TIDB")]
    TiDb,
    #[serde(rename = "MARIADB")]
    MariaDb,
    #[serde(rename = "OCEANBASE")]
    OceanBase,
    Postgres,
    Oracle,
    Snowflake,
    #[serde(rename = "CLICKHOUSE")]
    ClickHouse,
    Sqlite,
    #[serde(rename = "MONGODB")]
    MongoDb,
    Spanner,
    Redis,
}

impl DbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "MYSQL",
            Self::TiDb => "TIDB",
            Self::MariaDb => "MARIADB",
            Self::OceanBase => "OCEANBASE",
            Self::Postgres => "POSTGRES",
            Self::Oracle => "ORACLE",
            Self::Snowflake => "SNOWFLAKE",
            Self::ClickHouse => "CLICKHOUSE",
            Self::Sqlite => "SQLITE",
            Self::MongoDb => "MONGODB",
            Self::Spanner => "SPANNER",
            Self::Redis => "REDIS",
        }
    }

    /// Engines with a statement syntax checker
    pub fn supports_syntax_check(&self) -> bool {
        matches!(
            self,
            Self::MySql | Self::TiDb | Self::MariaDb | Self::OceanBase | Self::Postgres
        )
    }

    /// Engines with SQL review (advisor) rules
    pub fn supports_sql_review(&self) -> bool {
        matches!(
            self,
            Self::Postgres
                | Self::MySql
                | Self::TiDb
                | Self::MariaDb
                | Self::Oracle
                | Self::OceanBase
                | Self::Snowflake
        )
    }

    /// Engines whose statements can be classified by type
    pub fn supports_statement_type_check(&self) -> bool {
        matches!(
            self,
            Self::Postgres | Self::MySql | Self::TiDb | Self::MariaDb | Self::OceanBase
        )
    }

    /// Engines gh-ost can migrate
    pub fn supports_online_schema_change(&self) -> bool {
        matches!(self, Self::MySql | Self::MariaDb)
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MYSQL" => Ok(Self::MySql),
            "TIDB" => Ok(Self::TiDb),
            "MARIADB" => Ok(Self::MariaDb),
            "OCEANBASE" => Ok(Self::OceanBase),
            "POSTGRES" => Ok(Self::Postgres),
            "ORACLE" => Ok(Self::Oracle),
            "SNOWFLAKE" => Ok(Self::Snowflake),
            "CLICKHOUSE" => Ok(Self::ClickHouse),
            "SQLITE" => Ok(Self::Sqlite),
            "MONGODB" => Ok(Self::MongoDb),
            "SPANNER" => Ok(Self::Spanner),
            "REDIS" => Ok(Self::Redis),
            _ => Err(format!("Invalid database type: {s}")),
        }
    }
}

/// A database server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub environment_id: i64,
    pub name: String,
    pub engine: DbType,
    pub host: String,
    pub port: String,
    /// Admin data source credentials
    pub username: String,
    pub password: String,
}

/// A logical database on an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: i64,
    pub instance_id: i64,
    pub project_id: i64,
    pub environment_id: i64,
    pub name: String,
    pub character_set: String,
    pub collation: String,
}

/// Whether a project asks for an LGTM comment before rollout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LgtmCheckSetting {
    #[default]
    Disabled,
    ProjectOwner,
    ProjectMember,
}

/// The issue a pipeline belongs to, reduced to what check composition reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub pipeline_id: i64,
    pub project_id: i64,
    pub lgtm_check: LgtmCheckSetting,
}

/// Per-environment rollout approval policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalPolicy {
    /// Tasks roll out without a human approval
    ManualApprovalNever,
    #[default]
    ManualApprovalAlways,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(DbType::Postgres.supports_syntax_check());
        assert!(!DbType::MongoDb.supports_sql_review());
        assert!(DbType::Snowflake.supports_sql_review());
        assert!(!DbType::Snowflake.supports_statement_type_check());
        assert!(DbType::MySql.supports_online_schema_change());
        assert!(!DbType::Postgres.supports_online_schema_change());
    }

    #[test]
    fn test_db_type_parse_and_serde() {
        assert_eq!("mysql".parse::<DbType>().unwrap(), DbType::MySql);
        assert_eq!(serde_json::to_string(&DbType::TiDb).unwrap(), "\"TIDB\"");
        assert_eq!(serde_json::to_string(&DbType::Postgres).unwrap(), "\"POSTGRES\"");
    }
}
