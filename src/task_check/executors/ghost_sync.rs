use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{close_driver, connection_config, connection_context, load_database, load_instance, CORE_NAMESPACE};
use crate::config::GhostSettings;
use crate::driver::DriverRegistry;
use crate::error::{ErrorCode, Result};
use crate::ghost::{build_ghost_config, GhostEngine};
use crate::models::{Task, TaskCheckResult, TaskCheckRun};
use crate::store::Store;
use crate::task_check::executor::TaskCheckExecutor;

/// Dry-runs gh-ost against the target with the configuration the real run would use
pub struct GhostSyncExecutor {
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
    engine: Arc<dyn GhostEngine>,
    settings: GhostSettings,
}

impl GhostSyncExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        drivers: Arc<DriverRegistry>,
        engine: Arc<dyn GhostEngine>,
        settings: GhostSettings,
    ) -> Self {
        Self {
            store,
            drivers,
            engine,
            settings,
        }
    }
}

#[async_trait]
impl TaskCheckExecutor for GhostSyncExecutor {
    async fn run(&self, _check_run: &TaskCheckRun, task: &Task) -> Result<Vec<TaskCheckResult>> {
        let database = load_database(self.store.as_ref(), task).await?;
        let instance = load_instance(self.store.as_ref(), task).await?;

        let driver = self
            .drivers
            .open(
                instance.engine,
                &connection_config(&instance, &database.name),
                &connection_context(&instance),
            )
            .await?;
        let instance_meta = driver.sync_instance().await;
        close_driver(driver, &instance).await;
        let instance_meta = instance_meta?;

        let outcome = match build_ghost_config(task, &database, &instance, &instance_meta, &self.settings, true) {
            Ok(config) => {
                debug!(task_id = task.id, table = %config.table, "Validating gh-ost configuration");
                self.engine.validate(&config).await
            }
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(()) => TaskCheckResult::success(
                CORE_NAMESPACE,
                "OK",
                "gh-ost dry run succeeded",
            ),
            Err(e) => TaskCheckResult::error(
                CORE_NAMESPACE,
                ErrorCode::GhostConfigInvalid,
                "gh-ost dry run failed",
                e.to_string(),
            ),
        };
        Ok(vec![result])
    }
}
