//! # Pipeline Creator
//!
//! Builds and persists an execution plan in one batch.
//!
//! Stages are often assembled from independently computed groups of tasks
//! (one group per database of a deployment row, say). Each group numbers its
//! DAG edges from zero; [`merge_task_create_lists`] flattens the groups and
//! shifts every edge by the number of tasks placed before its group, so the
//! dependency semantics inside each group survive the merge.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::errors::WorkflowError;
use crate::error::Result;
use crate::models::{
    CutoverPayload, Database, GhostSyncPayload, Pipeline, PipelineCreate, TaskCreate,
    TaskIndexDag, TaskPayload, TaskType,
};
use crate::state_machine::TaskStatus;
use crate::store::Store;
use crate::task_check::composer::TaskCheckComposer;

/// Tasks built together plus their group-local DAG edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCreateGroup {
    pub task_list: Vec<TaskCreate>,
    pub task_index_dag_list: Vec<TaskIndexDag>,
}

impl TaskCreateGroup {
    pub fn new(task_list: Vec<TaskCreate>, task_index_dag_list: Vec<TaskIndexDag>) -> Self {
        Self {
            task_list,
            task_index_dag_list,
        }
    }
}

/// Flatten groups into one task list, shifting edges by the prefix task count
pub fn merge_task_create_lists<I>(groups: I) -> TaskCreateGroup
where
    I: IntoIterator<Item = TaskCreateGroup>,
{
    let mut merged = TaskCreateGroup::default();
    for group in groups {
        let offset = merged.task_list.len();
        merged.task_index_dag_list.extend(
            group
                .task_index_dag_list
                .iter()
                .map(|edge| edge.shifted(offset)),
        );
        merged.task_list.extend(group.task_list);
    }
    merged
}

/// Reject out-of-range edges, self-loops and cycles
pub fn validate_dag(stage: &str, task_count: usize, edges: &[TaskIndexDag]) -> Result<()> {
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); task_count];
    let mut in_degree = vec![0usize; task_count];

    for edge in edges {
        if edge.from_index >= task_count || edge.to_index >= task_count {
            return Err(WorkflowError::DagIndexOutOfRange {
                stage: stage.to_string(),
                from_index: edge.from_index,
                to_index: edge.to_index,
                task_count,
            }
            .into());
        }
        if edge.from_index == edge.to_index {
            return Err(WorkflowError::DagSelfLoop {
                stage: stage.to_string(),
                index: edge.from_index,
            }
            .into());
        }
        successors[edge.from_index].push(edge.to_index);
        in_degree[edge.to_index] += 1;
    }

    // Kahn's algorithm: a cycle leaves some node with a positive in-degree
    let mut ready: VecDeque<usize> = (0..task_count).filter(|i| in_degree[*i] == 0).collect();
    let mut visited = 0;
    while let Some(index) = ready.pop_front() {
        visited += 1;
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if visited != task_count {
        return Err(WorkflowError::DagCycle {
            stage: stage.to_string(),
        }
        .into());
    }
    Ok(())
}

/// The gh-ost sync task followed by its cutover; the sync blocks the cutover
pub fn ghost_task_list(
    database: &Database,
    statement: &str,
    schema_version: &str,
    earliest_allowed_ts: i64,
) -> TaskCreateGroup {
    let sync = TaskCreate {
        name: format!("Update schema gh-ost sync for database {:?}", database.name),
        instance_id: database.instance_id,
        database_id: Some(database.id),
        status: TaskStatus::PendingApproval,
        task_type: TaskType::SchemaUpdateGhostSync,
        payload: TaskPayload::GhostSync(GhostSyncPayload {
            statement: statement.to_string(),
            schema_version: schema_version.to_string(),
            skipped: false,
        }),
        earliest_allowed_ts,
        database_name: database.name.clone(),
    };
    let cutover = TaskCreate {
        name: format!("Update schema gh-ost cutover for database {:?}", database.name),
        task_type: TaskType::SchemaUpdateGhostCutover,
        payload: TaskPayload::Cutover(CutoverPayload::default()),
        ..sync.clone()
    };

    TaskCreateGroup::new(vec![sync, cutover], vec![TaskIndexDag::new(0, 1)])
}

/// Outcome of [`PipelineCreator::create_pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineCreationResult {
    pub pipeline: Pipeline,
    pub task_count: usize,
    /// Check runs queued for the new tasks; 0 without a composer
    pub check_run_count: usize,
}

/// Validates, persists and optionally queues checks for a new pipeline
pub struct PipelineCreator {
    store: Arc<dyn Store>,
    composer: Option<Arc<TaskCheckComposer>>,
}

impl std::fmt::Debug for PipelineCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCreator")
            .field("schedules_checks", &self.composer.is_some())
            .finish()
    }
}

impl PipelineCreator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            composer: None,
        }
    }

    /// Queue checks for every task of each created pipeline
    pub fn with_composer(mut self, composer: Arc<TaskCheckComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    #[instrument(skip(self, create), fields(pipeline = %create.name, stages = create.stage_list.len()))]
    pub async fn create_pipeline(&self, create: &PipelineCreate) -> Result<PipelineCreationResult> {
        for stage in &create.stage_list {
            validate_dag(&stage.name, stage.task_list.len(), &stage.task_index_dag_list)?;
        }

        let pipeline = self.store.create_pipeline_batch(create).await?;
        let task_count = pipeline.tasks().count();
        debug!(pipeline_id = pipeline.id, task_count = task_count, "Pipeline persisted");

        let check_run_count = match &self.composer {
            Some(composer) => composer.schedule_pipeline_task_check(&pipeline).await?.len(),
            None => 0,
        };

        info!(
            pipeline_id = pipeline.id,
            task_count = task_count,
            check_run_count = check_run_count,
            "Pipeline created"
        );

        Ok(PipelineCreationResult {
            pipeline,
            task_count,
            check_run_count,
        })
    }
}
