//! # Store Boundary
//!
//! Persistence operations the orchestration core consumes. Status patches are
//! per-row atomic read-modify-write; pipeline creation is one atomic batch
//! covering the pipeline, its stages, tasks and DAG edges.
//!
//! [`InMemoryStore`] is the reference implementation used by the CLI and the
//! test suite.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ApprovalPolicy, Database, Instance, Issue, Pipeline, PipelineCreate, Task, TaskCheckRun,
    TaskCheckRunCreate, TaskCheckRunFind, TaskCheckRunStatusPatch, TaskDag, TaskFind, TaskRun,
    TaskRunCreate, TaskRunStatusPatch, TaskStatusPatch,
};

pub use memory::InMemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    // Workflow

    /// Persist a pipeline with its stages, tasks and remapped DAG edges
    ///
    /// Either everything is created or nothing is.
    async fn create_pipeline_batch(&self, create: &PipelineCreate) -> Result<Pipeline>;

    async fn get_pipeline(&self, id: i64) -> Result<Option<Pipeline>>;

    async fn get_task(&self, id: i64) -> Result<Option<Task>>;

    async fn find_tasks(&self, find: &TaskFind) -> Result<Vec<Task>>;

    /// Compare-and-set the task status
    ///
    /// Fails with a concurrent modification error when the row no longer has
    /// `patch.expected`.
    async fn patch_task_status(&self, patch: TaskStatusPatch) -> Result<Task>;

    /// Every DAG edge between tasks of the pipeline
    async fn find_task_dags(&self, pipeline_id: i64) -> Result<Vec<TaskDag>>;

    // Task runs

    async fn create_task_run(&self, create: &TaskRunCreate) -> Result<TaskRun>;

    /// Apply a run event; terminal runs reject every event
    async fn patch_task_run(&self, patch: &TaskRunStatusPatch) -> Result<TaskRun>;

    // Task check runs

    /// Insert the rows as one batch, all in `Queued` status
    async fn create_task_check_runs(&self, creates: &[TaskCheckRunCreate]) -> Result<Vec<TaskCheckRun>>;

    async fn find_task_check_runs(&self, find: &TaskCheckRunFind) -> Result<Vec<TaskCheckRun>>;

    async fn patch_task_check_run_status(&self, patch: &TaskCheckRunStatusPatch) -> Result<TaskCheckRun>;

    // Catalog

    async fn get_database(&self, id: i64) -> Result<Option<Database>>;

    async fn get_instance(&self, id: i64) -> Result<Option<Instance>>;

    /// The issue owning the pipeline, if any
    async fn find_issue_by_pipeline(&self, pipeline_id: i64) -> Result<Option<Issue>>;

    async fn get_pipeline_approval_policy(&self, environment_id: i64) -> Result<ApprovalPolicy>;

    /// Effective SQL review policy of an environment
    async fn get_sql_review_policy_id(&self, environment_id: i64) -> Result<i64>;
}
