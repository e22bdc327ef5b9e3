//! Postgres history bookkeeping
//!
//! Implements the [`MigrationExecutor`] hooks against a `migration_history`
//! table. Queries are checked at runtime so the crate builds without a live
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use super::executor::MigrationExecutor;
use super::version::{from_stored_version, to_stored_version};
use super::{NAMESPACE_SEQUENCE_INDEX, NAMESPACE_VERSION_INDEX};
use crate::constants::migration::HISTORY_TABLE;
use crate::error::{Result, SchemaflowError};
use crate::models::{
    MigrationHistory, MigrationHistoryFind, MigrationInfo, MigrationSource, MigrationStatus,
    MigrationType,
};

/// Advisory lock key serializing concurrent setup runs
const SETUP_LOCK_KEY: i64 = 0x5c4e_3a11;

const SELECT_COLUMNS: &str = "id, creator, created_ts, updater, updated_ts, release_version, \
     namespace, sequence, source, type, status, version, description, statement, schema, \
     schema_prev, execution_duration_ns, issue_id";

/// History table backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgMigrationHistory {
    pool: PgPool,
}

impl PgMigrationHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// DDL creating the table and its indexes; every statement is idempotent
    pub fn setup_statements() -> Vec<String> {
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} (
                    id BIGSERIAL PRIMARY KEY,
                    creator TEXT NOT NULL,
                    created_ts TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updater TEXT NOT NULL,
                    updated_ts TIMESTAMPTZ NOT NULL DEFAULT now(),
                    release_version TEXT NOT NULL,
                    namespace TEXT NOT NULL,
                    sequence BIGINT NOT NULL CHECK (sequence >= 0),
                    source TEXT NOT NULL CHECK (source IN ('UI', 'VCS', 'LIBRARY')),
                    type TEXT NOT NULL CHECK (type IN ('BASELINE', 'MIGRATE', 'MIGRATE_SDL', 'BRANCH', 'DATA')),
                    status TEXT NOT NULL CHECK (status IN ('PENDING', 'DONE', 'FAILED')),
                    version TEXT NOT NULL,
                    description TEXT NOT NULL,
                    statement TEXT NOT NULL,
                    schema TEXT NOT NULL,
                    schema_prev TEXT NOT NULL,
                    execution_duration_ns BIGINT NOT NULL,
                    issue_id BIGINT
                )"
            ),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {NAMESPACE_SEQUENCE_INDEX} ON {HISTORY_TABLE} (namespace, sequence)"
            ),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {NAMESPACE_VERSION_INDEX} ON {HISTORY_TABLE} (namespace, version)"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_migration_history_namespace_created ON {HISTORY_TABLE} (namespace, created_ts)"
            ),
        ]
    }

    /// Whether the history table is missing
    pub async fn needs_setup(&self) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(HISTORY_TABLE)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_none())
    }

    /// Create the history table under an advisory lock
    pub async fn setup_if_needed(&self) -> Result<()> {
        if !self.needs_setup().await? {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SETUP_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        for statement in Self::setup_statements() {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(table = HISTORY_TABLE, "Migration history bookkeeping set up");
        Ok(())
    }

    fn history_from_row(row: &PgRow) -> Result<MigrationHistory> {
        let stored_version: String = row.try_get("version")?;
        let decoded = from_stored_version(&stored_version)?;
        let source: String = row.try_get("source")?;
        let migration_type: String = row.try_get("type")?;
        let status: String = row.try_get("status")?;

        Ok(MigrationHistory {
            id: row.try_get("id")?,
            creator: row.try_get("creator")?,
            created_ts: row.try_get::<DateTime<Utc>, _>("created_ts")?,
            updater: row.try_get("updater")?,
            updated_ts: row.try_get::<DateTime<Utc>, _>("updated_ts")?,
            release_version: row.try_get("release_version")?,
            namespace: row.try_get("namespace")?,
            sequence: row.try_get("sequence")?,
            source: source
                .parse::<MigrationSource>()
                .map_err(SchemaflowError::Internal)?,
            migration_type: migration_type
                .parse::<MigrationType>()
                .map_err(SchemaflowError::Internal)?,
            status: status
                .parse::<MigrationStatus>()
                .map_err(SchemaflowError::Internal)?,
            version: decoded.version,
            use_semantic_version: decoded.use_semantic_version,
            semantic_version_suffix: decoded.semantic_version_suffix,
            description: row.try_get("description")?,
            statement: row.try_get("statement")?,
            schema: row.try_get("schema")?,
            schema_prev: row.try_get("schema_prev")?,
            execution_duration_ns: row.try_get("execution_duration_ns")?,
            issue_id: row.try_get("issue_id")?,
        })
    }
}

#[async_trait]
impl MigrationExecutor for PgMigrationHistory {
    async fn find_largest_version_since_baseline(&self, namespace: &str) -> Result<Option<String>> {
        let version: Option<String> = sqlx::query_scalar(&format!(
            "SELECT MAX(version) FROM {HISTORY_TABLE}
             WHERE namespace = $1 AND sequence >= COALESCE(
                 (SELECT MAX(sequence) FROM {HISTORY_TABLE}
                  WHERE namespace = $1 AND type IN ('BASELINE', 'BRANCH')), 0)"
        ))
        .bind(namespace)
        .fetch_one(&self.pool)
        .await?;
        Ok(version)
    }

    async fn find_largest_sequence(&self, namespace: &str) -> Result<i64> {
        let sequence: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT MAX(sequence) FROM {HISTORY_TABLE} WHERE namespace = $1"
        ))
        .bind(namespace)
        .fetch_one(&self.pool)
        .await?;
        Ok(sequence.unwrap_or(0))
    }

    async fn insert_pending_history(
        &self,
        sequence: i64,
        prev_schema: &str,
        info: &MigrationInfo,
        stored_version: &str,
        statement: &str,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {HISTORY_TABLE} (
                creator, updater, release_version, namespace, sequence, source, type, status,
                version, description, statement, schema, schema_prev, execution_duration_ns, issue_id
             ) VALUES ($1, $1, $2, $3, $4, $5, $6, 'PENDING', $7, $8, $9, $10, $10, 0, $11)
             RETURNING id"
        ))
        .bind(&info.creator)
        .bind(&info.release_version)
        .bind(&info.namespace)
        .bind(sequence)
        .bind(info.source.as_str())
        .bind(info.migration_type.as_str())
        .bind(stored_version)
        .bind(&info.description)
        .bind(statement)
        .bind(prev_schema)
        .bind(info.issue_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(history_id = id, namespace = %info.namespace, "Inserted pending history");
        Ok(id)
    }

    async fn rearm_pending_history(&self, id: i64, prev_schema: &str, statement: &str) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {HISTORY_TABLE}
             SET status = 'PENDING', statement = $2, schema = $3, schema_prev = $3,
                 execution_duration_ns = 0, updated_ts = now()
             WHERE id = $1"
        ))
        .bind(id)
        .bind(statement)
        .bind(prev_schema)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_history_as_done(
        &self,
        migration_duration_ns: i64,
        updated_schema: &str,
        id: i64,
    ) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {HISTORY_TABLE}
             SET status = 'DONE', execution_duration_ns = $1, schema = $2, updated_ts = now()
             WHERE id = $3"
        ))
        .bind(migration_duration_ns)
        .bind(updated_schema)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_history_as_failed(&self, migration_duration_ns: i64, id: i64) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {HISTORY_TABLE}
             SET status = 'FAILED', execution_duration_ns = $1, updated_ts = now()
             WHERE id = $2"
        ))
        .bind(migration_duration_ns)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_history_list(&self, find: &MigrationHistoryFind) -> Result<Vec<MigrationHistory>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM {HISTORY_TABLE} WHERE TRUE"));

        if let Some(id) = find.id {
            query.push(" AND id = ").push_bind(id);
        }
        if let Some(database) = &find.database {
            query.push(" AND namespace = ").push_bind(database.clone());
        }
        if let Some(source) = find.source {
            query.push(" AND source = ").push_bind(source.as_str());
        }
        if let Some(stored_version) = &find.stored_version {
            query.push(" AND version = ").push_bind(stored_version.clone());
        }
        if let Some(version) = &find.version {
            if find.use_semantic_version {
                // semantic keys carry a suffix, so match on the padded prefix
                let prefix = to_stored_version(true, version, "")?;
                query.push(" AND version LIKE ").push_bind(format!("{prefix}%"));
            } else {
                query
                    .push(" AND version = ")
                    .push_bind(to_stored_version(false, version, "")?);
            }
        }
        query.push(" ORDER BY namespace, sequence DESC");
        if let Some(limit) = find.limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::history_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_statements_create_unique_indexes() {
        let statements = PgMigrationHistory::setup_statements();
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS migration_history"));
        assert!(statements
            .iter()
            .any(|s| s.contains(NAMESPACE_VERSION_INDEX) && s.contains("(namespace, version)")));
        assert!(statements
            .iter()
            .any(|s| s.contains(NAMESPACE_SEQUENCE_INDEX) && s.contains("(namespace, sequence)")));
    }
}
