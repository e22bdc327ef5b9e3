use async_trait::async_trait;
use std::sync::Arc;

use super::{close_driver, connection_config, connection_context, load_database, load_instance, CORE_NAMESPACE};
use crate::driver::DriverRegistry;
use crate::error::Result;
use crate::models::{Task, TaskCheckResult, TaskCheckRun};
use crate::store::Store;
use crate::task_check::executor::TaskCheckExecutor;

/// Reports whether the task's database accepts a connection
///
/// A refused connection is a finding, not an executor failure.
pub struct DatabaseConnectExecutor {
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
}

impl DatabaseConnectExecutor {
    pub fn new(store: Arc<dyn Store>, drivers: Arc<DriverRegistry>) -> Self {
        Self { store, drivers }
    }
}

#[async_trait]
impl TaskCheckExecutor for DatabaseConnectExecutor {
    async fn run(&self, _check_run: &TaskCheckRun, task: &Task) -> Result<Vec<TaskCheckResult>> {
        let database = load_database(self.store.as_ref(), task).await?;
        let instance = load_instance(self.store.as_ref(), task).await?;

        let driver = match self
            .drivers
            .open(
                instance.engine,
                &connection_config(&instance, &database.name),
                &connection_context(&instance),
            )
            .await
        {
            Ok(driver) => driver,
            Err(e) => {
                return Ok(vec![TaskCheckResult::error(
                    CORE_NAMESPACE,
                    e.code(),
                    format!("Failed to connect {:?}", database.name),
                    e.to_string(),
                )])
            }
        };
        close_driver(driver, &instance).await;

        Ok(vec![TaskCheckResult::success(
            CORE_NAMESPACE,
            "OK",
            format!("Successfully connected {:?}", database.name),
        )])
    }
}
