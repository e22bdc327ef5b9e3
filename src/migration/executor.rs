use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use super::version::to_stored_version;
use super::{MigrationError, NAMESPACE_SEQUENCE_INDEX, NAMESPACE_VERSION_INDEX};
use crate::driver::Driver;
use crate::error::{Result, SchemaflowError};
use crate::models::{
    MigrationHistory, MigrationHistoryFind, MigrationInfo, MigrationStatus, MigrationType,
};

/// History bookkeeping hooks an engine provides to [`execute_migration`]
#[async_trait]
pub trait MigrationExecutor: Send + Sync {
    /// Largest stored version since the last Baseline or Branch row, inclusive
    async fn find_largest_version_since_baseline(&self, namespace: &str) -> Result<Option<String>>;

    /// Largest sequence in the namespace; 0 when nothing was applied yet
    async fn find_largest_sequence(&self, namespace: &str) -> Result<i64>;

    /// Insert a PENDING row and return its id
    async fn insert_pending_history(
        &self,
        sequence: i64,
        prev_schema: &str,
        info: &MigrationInfo,
        stored_version: &str,
        statement: &str,
    ) -> Result<i64>;

    /// Put an existing PENDING/FAILED row back to PENDING for a forced re-run
    async fn rearm_pending_history(&self, id: i64, prev_schema: &str, statement: &str) -> Result<()>;

    async fn update_history_as_done(
        &self,
        migration_duration_ns: i64,
        updated_schema: &str,
        id: i64,
    ) -> Result<()>;

    async fn update_history_as_failed(&self, migration_duration_ns: i64, id: i64) -> Result<()>;

    /// History rows ordered by namespace, then sequence descending
    async fn find_history_list(&self, find: &MigrationHistoryFind) -> Result<Vec<MigrationHistory>>;
}

/// Result of a migration attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub history_id: i64,
    pub updated_schema: String,
    /// The version was already applied by the same issue; nothing ran
    pub already_applied: bool,
}

enum Begin {
    Started(i64),
    AlreadyApplied(i64),
}

/// Map unique-index violations on the history table to migration errors
pub fn format_error(err: SchemaflowError) -> SchemaflowError {
    let message = err.to_string();
    if message.contains(NAMESPACE_VERSION_INDEX) {
        MigrationError::VersionAlreadyApplied.into()
    } else if message.contains(NAMESPACE_SEQUENCE_INDEX) {
        MigrationError::ConcurrentMigration.into()
    } else {
        err
    }
}

/// Apply one migration and record it in the history
///
/// The PENDING row is resolved to DONE or FAILED whether or not the statement
/// succeeded. A version already applied by the same issue returns the existing
/// row without executing anything.
#[instrument(
    skip(driver, executor, info, statement),
    fields(namespace = %info.namespace, version = %info.version, migration_type = %info.migration_type)
)]
pub async fn execute_migration<D, E>(
    driver: &D,
    executor: &E,
    info: &MigrationInfo,
    statement: &str,
) -> Result<MigrationOutcome>
where
    D: Driver + ?Sized,
    E: MigrationExecutor + ?Sized,
{
    // There is no schema to record before the database exists
    let prev_schema = if info.create_database {
        String::new()
    } else {
        driver
            .dump(&info.database, true)
            .await
            .map_err(format_error)?
    };

    let history_id = match begin_migration(executor, info, &prev_schema, statement).await? {
        Begin::AlreadyApplied(id) => {
            info!(history_id = id, "Migration version already applied, skipping execution");
            return Ok(MigrationOutcome {
                history_id: id,
                updated_schema: prev_schema,
                already_applied: true,
            });
        }
        Begin::Started(id) => id,
    };

    let started = Instant::now();
    let result = apply_statement(driver, info, statement).await;
    end_migration(executor, started, history_id, result.as_deref().ok()).await;

    let updated_schema = result?;
    info!(history_id = history_id, "Migration applied");
    Ok(MigrationOutcome {
        history_id,
        updated_schema,
        already_applied: false,
    })
}

async fn apply_statement<D>(driver: &D, info: &MigrationInfo, statement: &str) -> Result<String>
where
    D: Driver + ?Sized,
{
    // Baseline records the live schema without running its statement
    let do_migrate = !statement.trim().is_empty() && info.migration_type != MigrationType::Baseline;
    if do_migrate {
        driver
            .execute(statement, info.create_database)
            .await
            .map_err(format_error)?;
    } else {
        debug!("Statement skipped");
    }

    driver
        .dump(&info.database, true)
        .await
        .map_err(format_error)
}

/// Pre-check the history and record the attempt as PENDING
async fn begin_migration<E>(
    executor: &E,
    info: &MigrationInfo,
    prev_schema: &str,
    statement: &str,
) -> Result<Begin>
where
    E: MigrationExecutor + ?Sized,
{
    let stored_version = to_stored_version(
        info.use_semantic_version,
        &info.version,
        &info.semantic_version_suffix,
    )?;

    let existing = executor
        .find_history_list(&MigrationHistoryFind {
            database: Some(info.namespace.clone()),
            stored_version: Some(stored_version.clone()),
            ..Default::default()
        })
        .await?;

    if let Some(history) = existing.first() {
        let force = info.force && info.migration_type.allows_force();
        match history.status {
            MigrationStatus::Done => {
                if history.issue_id != info.issue_id {
                    return Err(MigrationError::AppliedByOtherIssue {
                        database: info.database.clone(),
                        version: info.version.clone(),
                        issue_id: history.issue_id,
                    }
                    .into());
                }
                return Ok(Begin::AlreadyApplied(history.id));
            }
            MigrationStatus::Pending | MigrationStatus::Failed if force => {
                debug!(history_id = history.id, status = history.status.as_str(), "Forcing migration over existing history row");
                executor
                    .rearm_pending_history(history.id, prev_schema, statement)
                    .await?;
                return Ok(Begin::Started(history.id));
            }
            MigrationStatus::Pending => {
                return Err(MigrationError::InProgress {
                    database: info.database.clone(),
                    version: info.version.clone(),
                }
                .into());
            }
            MigrationStatus::Failed => {
                return Err(MigrationError::PreviouslyFailed {
                    database: info.database.clone(),
                    version: info.version.clone(),
                }
                .into());
            }
        }
    }

    let largest_sequence = executor.find_largest_sequence(&info.namespace).await?;

    if let Some(applied) = executor
        .find_largest_version_since_baseline(&info.namespace)
        .await?
    {
        if !applied.is_empty() && applied >= stored_version {
            return Err(MigrationError::OutOfOrder {
                database: info.database.clone(),
                applied,
                requested: stored_version,
            }
            .into());
        }
    }

    let id = executor
        .insert_pending_history(largest_sequence + 1, prev_schema, info, &stored_version, statement)
        .await
        .map_err(format_error)?;
    debug!(history_id = id, sequence = largest_sequence + 1, "Recorded pending migration");
    Ok(Begin::Started(id))
}

/// Resolve the PENDING row; failures here are logged, never raised
async fn end_migration<E>(executor: &E, started: Instant, history_id: i64, updated_schema: Option<&str>)
where
    E: MigrationExecutor + ?Sized,
{
    let duration_ns = i64::try_from(started.elapsed().as_nanos()).unwrap_or(i64::MAX);
    let result = match updated_schema {
        Some(schema) => {
            executor
                .update_history_as_done(duration_ns, schema, history_id)
                .await
        }
        None => executor.update_history_as_failed(duration_ns, history_id).await,
    };

    if let Err(e) = result {
        error!(history_id = history_id, error = %e, "Failed to update migration history record");
    }
}
