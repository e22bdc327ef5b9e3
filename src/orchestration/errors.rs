use thiserror::Error;

/// Errors raised while building or persisting an execution plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("stage {stage:?}: DAG edge {from_index} -> {to_index} is outside a batch of {task_count} tasks")]
    DagIndexOutOfRange {
        stage: String,
        from_index: usize,
        to_index: usize,
        task_count: usize,
    },

    #[error("stage {stage:?}: task {index} depends on itself")]
    DagSelfLoop { stage: String, index: usize },

    #[error("stage {stage:?}: DAG edges form a cycle")]
    DagCycle { stage: String },

    #[error("pipeline {pipeline_id} has no stages")]
    EmptyPipeline { pipeline_id: i64 },

    #[error("task {task_id} has no database")]
    MissingDatabase { task_id: i64 },

    #[error("{entity} {id} referenced by task {task_id} not found")]
    MissingCatalogEntry {
        entity: &'static str,
        id: i64,
        task_id: i64,
    },
}
