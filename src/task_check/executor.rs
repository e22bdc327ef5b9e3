use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Task, TaskCheckResult, TaskCheckRun};

/// Body of one check type
///
/// Findings, including failed validations, are returned as results. An `Err`
/// means the check could not be evaluated; the scheduler records it as a
/// FAILED run carrying the error's code.
#[async_trait]
pub trait TaskCheckExecutor: Send + Sync {
    async fn run(&self, check_run: &TaskCheckRun, task: &Task) -> Result<Vec<TaskCheckResult>>;
}
