//! Built-in check executors whose body is pure orchestration: open a driver,
//! ask it one question, turn the answer into findings.

mod database_connect;
mod ghost_sync;
mod migration_schema;

pub use database_connect::DatabaseConnectExecutor;
pub use ghost_sync::GhostSyncExecutor;
pub use migration_schema::InstanceMigrationSchemaExecutor;

use crate::driver::{ConnectionConfig, ConnectionContext, Driver};
use crate::error::Result;
use crate::models::{Database, Instance, Task};
use crate::orchestration::errors::WorkflowError;
use crate::store::Store;
use tracing::warn;

/// Namespace of findings reported by the built-in executors
pub const CORE_NAMESPACE: &str = "core";

/// Admin connection to `instance`, scoped to `database` unless empty
pub fn connection_config(instance: &Instance, database: &str) -> ConnectionConfig {
    ConnectionConfig {
        host: instance.host.clone(),
        port: instance.port.clone(),
        username: instance.username.clone(),
        password: instance.password.clone(),
        database: database.to_string(),
        read_only: false,
        strict_use_db: false,
    }
}

pub fn connection_context(instance: &Instance) -> ConnectionContext {
    ConnectionContext {
        environment_name: instance.environment_id.to_string(),
        instance_name: instance.name.clone(),
    }
}

pub(crate) async fn load_instance(store: &dyn Store, task: &Task) -> Result<Instance> {
    Ok(store
        .get_instance(task.instance_id)
        .await?
        .ok_or(WorkflowError::MissingCatalogEntry {
            entity: "instance",
            id: task.instance_id,
            task_id: task.id,
        })?)
}

pub(crate) async fn load_database(store: &dyn Store, task: &Task) -> Result<Database> {
    let database_id = task
        .database_id
        .ok_or(WorkflowError::MissingDatabase { task_id: task.id })?;
    Ok(store
        .get_database(database_id)
        .await?
        .ok_or(WorkflowError::MissingCatalogEntry {
            entity: "database",
            id: database_id,
            task_id: task.id,
        })?)
}

pub(crate) async fn close_driver(driver: Box<dyn Driver>, instance: &Instance) {
    if let Err(e) = driver.close().await {
        warn!(instance = %instance.name, error = %e, "Failed to close driver");
    }
}
