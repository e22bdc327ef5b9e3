//! # Workflow Models
//!
//! Read models for the execution plan (pipeline, stage, task, task run, DAG
//! edges), check runs, migration history and the catalog entries the
//! orchestration core consults.

pub mod catalog;
pub mod migration;
pub mod pipeline;
pub mod stage;
pub mod task;
pub mod task_check_run;
pub mod task_dag;
pub mod task_run;

// Re-export core models for easy access
pub use catalog::{ApprovalPolicy, Database, DbType, Instance, Issue, LgtmCheckSetting};
pub use migration::{
    MigrationHistory, MigrationHistoryFind, MigrationInfo, MigrationSource, MigrationStatus,
    MigrationType,
};
pub use pipeline::{Pipeline, PipelineCreate, PipelineStatus};
pub use stage::{Stage, StageCreate};
pub use task::{
    CutoverPayload, DatabaseCreatePayload, GeneralPayload, GhostSyncPayload, PitrRestorePayload,
    StatementPayload, Task, TaskCreate, TaskFind, TaskPayload, TaskStatusPatch, TaskType,
};
pub use task_check_run::{
    StatementAdvisePayload, StatementCheckPayload, TaskCheckPayload, TaskCheckResult,
    TaskCheckRun, TaskCheckRunCreate, TaskCheckRunFind, TaskCheckRunResultPayload,
    TaskCheckRunStatus, TaskCheckRunStatusPatch, TaskCheckStatus, TaskCheckType,
};
pub use task_dag::{TaskDag, TaskIndexDag};
pub use task_run::{TaskRun, TaskRunCreate, TaskRunStatusPatch};
