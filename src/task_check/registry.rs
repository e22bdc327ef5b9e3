//! Check type to executor dispatch table, built once at startup.
//!
//! ```rust
//! use async_trait::async_trait;
//! use schemaflow_core::error::Result;
//! use schemaflow_core::models::{Task, TaskCheckResult, TaskCheckRun, TaskCheckType};
//! use schemaflow_core::task_check::{ExecutorRegistry, TaskCheckExecutor};
//! use std::sync::Arc;
//!
//! struct AlwaysOk;
//!
//! #[async_trait]
//! impl TaskCheckExecutor for AlwaysOk {
//!     async fn run(&self, _run: &TaskCheckRun, _task: &Task) -> Result<Vec<TaskCheckResult>> {
//!         Ok(vec![TaskCheckResult::success("demo", "OK", "nothing to check")])
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let registry = ExecutorRegistry::builder()
//!     .register(TaskCheckType::StatementSyntax, Arc::new(AlwaysOk))?
//!     .build_requiring(&[TaskCheckType::StatementSyntax])?;
//! assert!(registry.contains(TaskCheckType::StatementSyntax));
//! assert!(registry.get(TaskCheckType::DatabaseConnect).is_none());
//! # Ok::<(), schemaflow_core::task_check::RegistryError>(())
//! # }).unwrap();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::executor::TaskCheckExecutor;
use crate::models::{DbType, TaskCheckType};

/// Startup wiring errors; never raised once the process is serving
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("executor for check type {check_type} registered twice")]
    DuplicateExecutor { check_type: TaskCheckType },

    #[error("no executor registered for check type {check_type}")]
    MissingExecutor { check_type: TaskCheckType },

    #[error("driver for {db_type} registered twice")]
    DuplicateDriver { db_type: DbType },

    #[error("no driver registered for {db_type}")]
    MissingDriver { db_type: DbType },
}

/// Immutable executor table consulted by the scheduler
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskCheckType, Arc<dyn TaskCheckExecutor>>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("check_types", &self.registered_types())
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn builder() -> ExecutorRegistryBuilder {
        ExecutorRegistryBuilder::default()
    }

    pub fn get(&self, check_type: TaskCheckType) -> Option<&Arc<dyn TaskCheckExecutor>> {
        self.executors.get(&check_type)
    }

    pub fn contains(&self, check_type: TaskCheckType) -> bool {
        self.executors.contains_key(&check_type)
    }

    /// Registered types in declaration order
    pub fn registered_types(&self) -> Vec<TaskCheckType> {
        TaskCheckType::ALL
            .into_iter()
            .filter(|check_type| self.executors.contains_key(check_type))
            .collect()
    }
}

#[derive(Default)]
pub struct ExecutorRegistryBuilder {
    executors: HashMap<TaskCheckType, Arc<dyn TaskCheckExecutor>>,
}

impl ExecutorRegistryBuilder {
    /// Add an executor; a second registration for the same type is rejected
    pub fn register(
        mut self,
        check_type: TaskCheckType,
        executor: Arc<dyn TaskCheckExecutor>,
    ) -> Result<Self, RegistryError> {
        if self.executors.contains_key(&check_type) {
            return Err(RegistryError::DuplicateExecutor { check_type });
        }
        debug!(check_type = %check_type, "Registered task check executor");
        self.executors.insert(check_type, executor);
        Ok(self)
    }

    pub fn build(self) -> ExecutorRegistry {
        ExecutorRegistry {
            executors: self.executors,
        }
    }

    /// Build, failing if any of `required` has no executor
    pub fn build_requiring(self, required: &[TaskCheckType]) -> Result<ExecutorRegistry, RegistryError> {
        if let Some(check_type) = required
            .iter()
            .copied()
            .find(|check_type| !self.executors.contains_key(check_type))
        {
            return Err(RegistryError::MissingExecutor { check_type });
        }
        Ok(self.build())
    }
}
