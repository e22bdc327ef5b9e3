//! # Database Driver Boundary
//!
//! The capability interface the orchestration core consumes from per-engine
//! drivers. The core never issues engine-specific SQL itself; it opens drivers
//! through a [`DriverRegistry`] and calls the operations below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ErrorCode, Result, SchemaflowError};
use crate::models::{DbType, MigrationHistory, MigrationHistoryFind, MigrationInfo};
use crate::task_check::registry::RegistryError;

/// Connection parameters for one instance or database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    /// Empty to connect to the instance rather than one database
    pub database: String,
    pub read_only: bool,
    /// Only the named database is reachable with these credentials
    pub strict_use_db: bool,
}

/// Names used for logging only; not part of the connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionContext {
    pub environment_name: String,
    pub instance_name: String,
}

/// A user on the instance together with its grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceUser {
    /// Quoted account name, e.g. `'rdsadmin'@'localhost'`
    pub name: String,
    /// Newline separated `GRANT ...` statements
    pub grant: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMeta {
    pub name: String,
    pub character_set: String,
    pub collation: String,
}

/// Instance metadata returned by a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMeta {
    pub version: String,
    pub user_list: Vec<InstanceUser>,
    pub database_list: Vec<DatabaseMeta>,
}

/// Schema of one database returned by a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    pub character_set: String,
    pub collation: String,
    pub table_list: Vec<String>,
}

/// Rows of a read-only query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub column_names: Vec<String>,
    pub column_type_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// An open connection to one database engine
#[async_trait]
pub trait Driver: Send + Sync {
    /// Engine the driver was opened for; one driver may serve several engines
    fn db_type(&self) -> DbType;

    /// Release the connection; must be called to avoid leaks
    async fn close(&self) -> Result<()>;

    async fn ping(&self) -> Result<()>;

    /// Execute a statement, returning the affected row count
    ///
    /// `create_database` marks statements that create the target database, so
    /// the driver must not switch to it first.
    async fn execute(&self, statement: &str, create_database: bool) -> Result<i64>;

    /// Execute a read-only statement, returning at most `limit` rows (0 = no limit)
    async fn query(&self, statement: &str, limit: usize) -> Result<QueryResult>;

    async fn sync_instance(&self) -> Result<InstanceMeta>;

    async fn sync_db_schema(&self, database: &str) -> Result<DatabaseSchema>;

    /// Dump a database as SQL text
    async fn dump(&self, database: &str, schema_only: bool) -> Result<String>;

    async fn restore(&self, sql: &str) -> Result<()>;

    /// Whether the history bookkeeping tables are missing or outdated
    async fn needs_setup_migration(&self) -> Result<bool>;

    /// Create or upgrade the history bookkeeping; idempotent and safe under concurrency
    async fn setup_migration_if_needed(&self) -> Result<()>;

    /// Apply one migration, returning the history id and the updated schema
    async fn execute_migration(&self, info: &MigrationInfo, statement: &str) -> Result<(i64, String)>;

    /// History rows, most recent first (namespace, then sequence descending)
    async fn find_migration_history_list(
        &self,
        find: &MigrationHistoryFind,
    ) -> Result<Vec<MigrationHistory>>;
}

/// Opens drivers for the engines it supports
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(
        &self,
        db_type: DbType,
        config: &ConnectionConfig,
        context: &ConnectionContext,
    ) -> Result<Box<dyn Driver>>;
}

/// Engine-keyed driver factories, populated once at startup
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<DbType, Arc<dyn DriverFactory>>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("engines", &self.registered_engines())
            .finish()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a second factory for the same engine is rejected
    pub fn register(
        &mut self,
        db_type: DbType,
        factory: Arc<dyn DriverFactory>,
    ) -> std::result::Result<(), RegistryError> {
        if self.factories.contains_key(&db_type) {
            return Err(RegistryError::DuplicateDriver { db_type });
        }
        debug!(db_type = %db_type, "Registered driver factory");
        self.factories.insert(db_type, factory);
        Ok(())
    }

    pub fn is_registered(&self, db_type: DbType) -> bool {
        self.factories.contains_key(&db_type)
    }

    pub fn registered_engines(&self) -> Vec<DbType> {
        let mut engines: Vec<DbType> = self.factories.keys().copied().collect();
        engines.sort_by_key(|engine| engine.as_str());
        engines
    }

    /// Open a driver and verify it answers a ping
    ///
    /// A driver that fails the ping is closed before the error is returned.
    pub async fn open(
        &self,
        db_type: DbType,
        config: &ConnectionConfig,
        context: &ConnectionContext,
    ) -> Result<Box<dyn Driver>> {
        let factory = self
            .factories
            .get(&db_type)
            .ok_or(RegistryError::MissingDriver { db_type })?;

        let driver = factory.open(db_type, config, context).await.map_err(|e| {
            SchemaflowError::driver(ErrorCode::DbConnectionFailure, e.to_string())
        })?;

        if let Err(e) = driver.ping().await {
            warn!(
                db_type = %db_type,
                instance = %context.instance_name,
                error = %e,
                "Driver ping failed, closing connection"
            );
            if let Err(close_err) = driver.close().await {
                warn!(error = %close_err, "Failed to close driver after ping failure");
            }
            return Err(SchemaflowError::driver(
                ErrorCode::DbConnectionFailure,
                e.to_string(),
            ));
        }

        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingFactory;

    #[async_trait]
    impl DriverFactory for RefusingFactory {
        async fn open(
            &self,
            _db_type: DbType,
            _config: &ConnectionConfig,
            _context: &ConnectionContext,
        ) -> Result<Box<dyn Driver>> {
            Err(SchemaflowError::Internal("socket closed".to_string()))
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = DriverRegistry::new();
        registry.register(DbType::Postgres, Arc::new(RefusingFactory)).unwrap();
        registry.register(DbType::MySql, Arc::new(RefusingFactory)).unwrap();

        let err = registry
            .register(DbType::MySql, Arc::new(RefusingFactory))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDriver { db_type: DbType::MySql });
        assert_eq!(registry.registered_engines(), vec![DbType::MySql, DbType::Postgres]);
    }

    #[tokio::test]
    async fn test_open_errors() {
        let mut registry = DriverRegistry::new();
        registry.register(DbType::MySql, Arc::new(RefusingFactory)).unwrap();
        let config = ConnectionConfig::default();
        let context = ConnectionContext::default();

        let missing = registry.open(DbType::Postgres, &config, &context).await.err();
        assert!(matches!(
            missing,
            Some(SchemaflowError::Registry(RegistryError::MissingDriver { .. }))
        ));

        let Err(refused) = registry.open(DbType::MySql, &config, &context).await else {
            panic!("open should fail");
        };
        assert_eq!(refused.code(), ErrorCode::DbConnectionFailure);
        assert!(refused.to_string().contains("socket closed"));
    }
}
