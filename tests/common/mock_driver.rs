//! In-memory driver implementing both the driver boundary and the history hooks

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use schemaflow_core::driver::{
    ConnectionConfig, ConnectionContext, DatabaseSchema, Driver, DriverFactory, InstanceMeta,
    QueryResult,
};
use schemaflow_core::error::{ErrorCode, Result, SchemaflowError};
use schemaflow_core::migration::{
    execute_migration, from_stored_version, to_stored_version, MigrationExecutor,
};
use schemaflow_core::models::{
    DbType, MigrationHistory, MigrationHistoryFind, MigrationInfo, MigrationStatus, MigrationType,
};

#[derive(Debug, Clone)]
struct HistoryRow {
    stored_version: String,
    history: MigrationHistory,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: i64,
    rows: Vec<HistoryRow>,
    schema: String,
    executed: Vec<String>,
    fail_marker: Option<String>,
    needs_setup: bool,
    ping_fails: bool,
    instance_meta: InstanceMeta,
}

/// Shared-state driver; clones observe the same history and schema
#[derive(Debug, Clone)]
pub struct MockDriver {
    db_type: DbType,
    state: Arc<Mutex<MockState>>,
    closes: Arc<AtomicUsize>,
}

impl MockDriver {
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type,
            state: Arc::new(Mutex::new(MockState::default())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Statements containing `marker` fail to execute
    pub fn fail_statements_containing(&self, marker: &str) {
        self.state.lock().fail_marker = Some(marker.to_string());
    }

    pub fn set_needs_setup(&self, needs_setup: bool) {
        self.state.lock().needs_setup = needs_setup;
    }

    pub fn set_ping_fails(&self, ping_fails: bool) {
        self.state.lock().ping_fails = ping_fails;
    }

    pub fn set_instance_meta(&self, meta: InstanceMeta) {
        self.state.lock().instance_meta = meta;
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn schema(&self) -> String {
        self.state.lock().schema.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Rows exactly as stored, for asserting on sequences and stored versions
    pub fn stored_rows(&self) -> Vec<(i64, String, MigrationStatus)> {
        self.state
            .lock()
            .rows
            .iter()
            .map(|row| (row.history.sequence, row.stored_version.clone(), row.history.status))
            .collect()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn db_type(&self) -> DbType {
        self.db_type
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.state.lock().ping_fails {
            return Err(SchemaflowError::driver(ErrorCode::DbConnectionFailure, "ping timed out"));
        }
        Ok(())
    }

    async fn execute(&self, statement: &str, _create_database: bool) -> Result<i64> {
        let mut state = self.state.lock();
        if let Some(marker) = &state.fail_marker {
            if statement.contains(marker.as_str()) {
                return Err(SchemaflowError::driver(
                    ErrorCode::DbExecutionError,
                    format!("syntax error near {marker:?}"),
                ));
            }
        }
        state.executed.push(statement.to_string());
        state.schema.push_str(statement);
        state.schema.push('\n');
        Ok(1)
    }

    async fn query(&self, _statement: &str, _limit: usize) -> Result<QueryResult> {
        Ok(QueryResult::default())
    }

    async fn sync_instance(&self) -> Result<InstanceMeta> {
        Ok(self.state.lock().instance_meta.clone())
    }

    async fn sync_db_schema(&self, database: &str) -> Result<DatabaseSchema> {
        Ok(DatabaseSchema {
            name: database.to_string(),
            ..Default::default()
        })
    }

    async fn dump(&self, _database: &str, _schema_only: bool) -> Result<String> {
        Ok(self.state.lock().schema.clone())
    }

    async fn restore(&self, sql: &str) -> Result<()> {
        self.state.lock().schema = sql.to_string();
        Ok(())
    }

    async fn needs_setup_migration(&self) -> Result<bool> {
        Ok(self.state.lock().needs_setup)
    }

    async fn setup_migration_if_needed(&self) -> Result<()> {
        self.state.lock().needs_setup = false;
        Ok(())
    }

    async fn execute_migration(&self, info: &MigrationInfo, statement: &str) -> Result<(i64, String)> {
        let outcome = execute_migration(self, self, info, statement).await?;
        Ok((outcome.history_id, outcome.updated_schema))
    }

    async fn find_migration_history_list(
        &self,
        find: &MigrationHistoryFind,
    ) -> Result<Vec<MigrationHistory>> {
        self.find_history_list(find).await
    }
}

#[async_trait]
impl MigrationExecutor for MockDriver {
    async fn find_largest_version_since_baseline(&self, namespace: &str) -> Result<Option<String>> {
        let state = self.state.lock();
        let rows: Vec<&HistoryRow> = state
            .rows
            .iter()
            .filter(|row| row.history.namespace == namespace)
            .collect();
        let since = rows
            .iter()
            .filter(|row| {
                matches!(
                    row.history.migration_type,
                    MigrationType::Baseline | MigrationType::Branch
                )
            })
            .map(|row| row.history.sequence)
            .max()
            .unwrap_or(0);
        Ok(rows
            .iter()
            .filter(|row| row.history.sequence >= since)
            .map(|row| row.stored_version.clone())
            .max())
    }

    async fn find_largest_sequence(&self, namespace: &str) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .rows
            .iter()
            .filter(|row| row.history.namespace == namespace)
            .map(|row| row.history.sequence)
            .max()
            .unwrap_or(0))
    }

    async fn insert_pending_history(
        &self,
        sequence: i64,
        prev_schema: &str,
        info: &MigrationInfo,
        stored_version: &str,
        statement: &str,
    ) -> Result<i64> {
        let mut state = self.state.lock();
        // mirror the two unique indexes of the real table
        if state.rows.iter().any(|row| {
            row.history.namespace == info.namespace && row.stored_version == stored_version
        }) {
            return Err(SchemaflowError::DatabaseError(
                "duplicate key violates idx_migration_history_unique_namespace_version".to_string(),
            ));
        }
        if state
            .rows
            .iter()
            .any(|row| row.history.namespace == info.namespace && row.history.sequence == sequence)
        {
            return Err(SchemaflowError::DatabaseError(
                "duplicate key violates idx_migration_history_unique_namespace_sequence".to_string(),
            ));
        }

        state.next_id += 1;
        let id = state.next_id;
        let decoded = from_stored_version(stored_version)?;
        let now = Utc::now();
        state.rows.push(HistoryRow {
            stored_version: stored_version.to_string(),
            history: MigrationHistory {
                id,
                creator: info.creator.clone(),
                created_ts: now,
                updater: info.creator.clone(),
                updated_ts: now,
                release_version: info.release_version.clone(),
                namespace: info.namespace.clone(),
                sequence,
                source: info.source,
                migration_type: info.migration_type,
                status: MigrationStatus::Pending,
                version: decoded.version,
                use_semantic_version: decoded.use_semantic_version,
                semantic_version_suffix: decoded.semantic_version_suffix,
                description: info.description.clone(),
                statement: statement.to_string(),
                schema: prev_schema.to_string(),
                schema_prev: prev_schema.to_string(),
                execution_duration_ns: 0,
                issue_id: info.issue_id,
            },
        });
        Ok(id)
    }

    async fn rearm_pending_history(&self, id: i64, prev_schema: &str, statement: &str) -> Result<()> {
        let mut state = self.state.lock();
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.history.id == id)
            .ok_or_else(|| SchemaflowError::not_found("migration history", id))?;
        row.history.status = MigrationStatus::Pending;
        row.history.statement = statement.to_string();
        row.history.schema = prev_schema.to_string();
        row.history.schema_prev = prev_schema.to_string();
        row.history.execution_duration_ns = 0;
        Ok(())
    }

    async fn update_history_as_done(
        &self,
        migration_duration_ns: i64,
        updated_schema: &str,
        id: i64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.history.id == id)
            .ok_or_else(|| SchemaflowError::not_found("migration history", id))?;
        row.history.status = MigrationStatus::Done;
        row.history.execution_duration_ns = migration_duration_ns;
        row.history.schema = updated_schema.to_string();
        Ok(())
    }

    async fn update_history_as_failed(&self, migration_duration_ns: i64, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.history.id == id)
            .ok_or_else(|| SchemaflowError::not_found("migration history", id))?;
        row.history.status = MigrationStatus::Failed;
        row.history.execution_duration_ns = migration_duration_ns;
        Ok(())
    }

    async fn find_history_list(&self, find: &MigrationHistoryFind) -> Result<Vec<MigrationHistory>> {
        let version_key = match &find.version {
            Some(version) => Some(to_stored_version(find.use_semantic_version, version, "")?),
            None => None,
        };

        let state = self.state.lock();
        let mut rows: Vec<&HistoryRow> = state
            .rows
            .iter()
            .filter(|row| find.id.map_or(true, |id| row.history.id == id))
            .filter(|row| {
                find.database
                    .as_ref()
                    .map_or(true, |db| &row.history.namespace == db)
            })
            .filter(|row| find.source.map_or(true, |source| row.history.source == source))
            .filter(|row| {
                find.stored_version
                    .as_ref()
                    .map_or(true, |stored| &row.stored_version == stored)
            })
            .filter(|row| match &version_key {
                None => true,
                Some(key) if find.use_semantic_version => row.stored_version.starts_with(key.as_str()),
                Some(key) => &row.stored_version == key,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.history
                .namespace
                .cmp(&b.history.namespace)
                .then(b.history.sequence.cmp(&a.history.sequence))
        });

        let limit = find.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| row.history.clone())
            .collect())
    }
}

/// Factory handing out clones of one MockDriver
#[derive(Debug, Clone)]
pub struct MockDriverFactory {
    pub driver: MockDriver,
    open_fails: Arc<Mutex<bool>>,
    opens: Arc<AtomicUsize>,
}

impl MockDriverFactory {
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver,
            open_fails: Arc::new(Mutex::new(false)),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_open_fails(&self, fails: bool) {
        *self.open_fails.lock() = fails;
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    async fn open(
        &self,
        _db_type: DbType,
        config: &ConnectionConfig,
        _context: &ConnectionContext,
    ) -> Result<Box<dyn Driver>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if *self.open_fails.lock() {
            return Err(SchemaflowError::driver(
                ErrorCode::DbConnectionFailure,
                format!("dial tcp {}:{}: connection refused", config.host, config.port),
            ));
        }
        Ok(Box::new(self.driver.clone()))
    }
}
