use async_trait::async_trait;
use std::sync::Arc;

use super::{close_driver, connection_config, connection_context, load_instance, CORE_NAMESPACE};
use crate::driver::DriverRegistry;
use crate::error::{ErrorCode, Result};
use crate::models::{Task, TaskCheckResult, TaskCheckRun};
use crate::store::Store;
use crate::task_check::executor::TaskCheckExecutor;

/// Reports whether the instance has its history bookkeeping set up
pub struct InstanceMigrationSchemaExecutor {
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
}

impl InstanceMigrationSchemaExecutor {
    pub fn new(store: Arc<dyn Store>, drivers: Arc<DriverRegistry>) -> Self {
        Self { store, drivers }
    }
}

#[async_trait]
impl TaskCheckExecutor for InstanceMigrationSchemaExecutor {
    async fn run(&self, _check_run: &TaskCheckRun, task: &Task) -> Result<Vec<TaskCheckResult>> {
        let instance = load_instance(self.store.as_ref(), task).await?;
        let driver = self
            .drivers
            .open(
                instance.engine,
                &connection_config(&instance, ""),
                &connection_context(&instance),
            )
            .await?;

        let needs_setup = driver.needs_setup_migration().await;
        close_driver(driver, &instance).await;

        let result = match needs_setup {
            Err(e) => TaskCheckResult::error(CORE_NAMESPACE, ErrorCode::Internal, "Error", e.to_string()),
            Ok(true) => TaskCheckResult::error(
                CORE_NAMESPACE,
                ErrorCode::MigrationSchemaMissing,
                "Missing migration schema",
                format!("Please create migration schema on instance {:?} first.", instance.name),
            ),
            Ok(false) => TaskCheckResult::success(
                CORE_NAMESPACE,
                "OK",
                format!("Instance {:?} has setup migration schema", instance.name),
            ),
        };
        Ok(vec![result])
    }
}
