//! # Orchestration
//!
//! Plan construction and scheduling decisions over the workflow model:
//!
//! - **pipeline_creator**: merges task groups, validates stage DAGs and
//!   persists a pipeline in one batch, optionally queueing its checks
//! - **task_eligibility**: active stage and DAG-based eligibility, plus the
//!   stage begin/end events derived from two pipeline snapshots

pub mod errors;
pub mod pipeline_creator;
pub mod task_eligibility;

pub use errors::WorkflowError;
pub use pipeline_creator::{
    ghost_task_list, merge_task_create_lists, validate_dag, PipelineCreationResult,
    PipelineCreator, TaskCreateGroup,
};
pub use task_eligibility::{
    active_stage, find_eligible_tasks, is_task_eligible, load_eligible_tasks,
    stage_progress_events, StageProgressEvent,
};
