//! # Task Eligibility
//!
//! A task may start when its stage is the active stage (the first stage in
//! pipeline order holding a task that is not DONE) and every DAG edge into it
//! comes from a DONE task. Only waiting tasks (PENDING or PENDING_APPROVAL)
//! are reported; running or settled tasks are not candidates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, SchemaflowError};
use crate::models::{Pipeline, Stage, Task, TaskDag};
use crate::state_machine::TaskStatus;
use crate::store::Store;

/// The first stage, in pipeline order, with a task that is not DONE
pub fn active_stage(pipeline: &Pipeline) -> Option<&Stage> {
    pipeline.stages.iter().find(|stage| stage.has_unfinished_task())
}

fn blocking_dependencies<'a>(
    pipeline: &'a Pipeline,
    dags: &'a [TaskDag],
    task_id: i64,
) -> impl Iterator<Item = i64> + 'a {
    let statuses: HashMap<i64, TaskStatus> =
        pipeline.tasks().map(|task| (task.id, task.status)).collect();
    dags.iter()
        .filter(move |edge| edge.to_task_id == task_id)
        .filter(move |edge| {
            !statuses
                .get(&edge.from_task_id)
                .is_some_and(TaskStatus::satisfies_dependencies)
        })
        .map(|edge| edge.from_task_id)
}

/// Whether the task may start now
pub fn is_task_eligible(pipeline: &Pipeline, dags: &[TaskDag], task_id: i64) -> bool {
    let Some(stage) = active_stage(pipeline) else {
        return false;
    };
    let Some(task) = stage.tasks.iter().find(|task| task.id == task_id) else {
        return false;
    };
    task.status.is_waiting() && blocking_dependencies(pipeline, dags, task_id).next().is_none()
}

/// Every task of the active stage that may start now, in stage order
pub fn find_eligible_tasks<'a>(pipeline: &'a Pipeline, dags: &[TaskDag]) -> Vec<&'a Task> {
    let Some(stage) = active_stage(pipeline) else {
        return Vec::new();
    };
    stage
        .tasks
        .iter()
        .filter(|task| {
            task.status.is_waiting() && blocking_dependencies(pipeline, dags, task.id).next().is_none()
        })
        .collect()
}

/// Load a pipeline with its edges and compute the eligible tasks
pub async fn load_eligible_tasks(store: &dyn Store, pipeline_id: i64) -> Result<Vec<Task>> {
    let pipeline = store
        .get_pipeline(pipeline_id)
        .await?
        .ok_or_else(|| SchemaflowError::not_found("pipeline", pipeline_id))?;
    let dags = store.find_task_dags(pipeline_id).await?;

    let eligible: Vec<Task> = find_eligible_tasks(&pipeline, &dags)
        .into_iter()
        .cloned()
        .collect();
    debug!(
        pipeline_id = pipeline_id,
        eligible = eligible.len(),
        "Computed eligible tasks"
    );
    Ok(eligible)
}

/// Stage lifecycle change between two snapshots of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageProgressEvent {
    /// The first task of the stage started; happens once per stage
    Begun { stage_id: i64 },
    /// Every task settled; happens again after a retry settles
    Ended { stage_id: i64 },
}

/// Compare two snapshots and report the stages that began or ended in between
pub fn stage_progress_events(before: &Pipeline, after: &Pipeline) -> Vec<StageProgressEvent> {
    let previous: HashMap<i64, &Stage> = before.stages.iter().map(|s| (s.id, s)).collect();
    let mut events = Vec::new();

    for stage in &after.stages {
        let Some(old) = previous.get(&stage.id) else {
            continue;
        };
        if !old.has_begun() && stage.has_begun() {
            events.push(StageProgressEvent::Begun { stage_id: stage.id });
        }
        if !stage.tasks.is_empty() && !old.is_settled() && stage.is_settled() {
            events.push(StageProgressEvent::Ended { stage_id: stage.id });
        }
    }
    events
}
