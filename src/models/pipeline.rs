use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::stage::{Stage, StageCreate};
use super::task::Task;
use crate::state_machine::TaskStatus;

/// Aggregate status of a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    #[default]
    Open,
    Done,
    Canceled,
}

impl PipelineStatus {
    /// Derive the status from the statuses of every task in the pipeline
    ///
    /// DONE when every task is DONE; CANCELED when every task is DONE or
    /// CANCELED and at least one is CANCELED; OPEN otherwise, including an
    /// empty pipeline.
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = TaskStatus>,
    {
        let mut any = false;
        let mut any_canceled = false;
        for status in statuses {
            any = true;
            match status {
                TaskStatus::Done => {}
                TaskStatus::Canceled => any_canceled = true,
                _ => return Self::Open,
            }
        }

        match (any, any_canceled) {
            (false, _) => Self::Open,
            (true, false) => Self::Done,
            (true, true) => Self::Canceled,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Done => write!(f, "DONE"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// One issue's execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub status: PipelineStatus,
    pub creator_id: i64,
    pub created_ts: DateTime<Utc>,
    /// Stages in rollout order
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// All tasks in stage order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.stages.iter().flat_map(|stage| stage.tasks.iter())
    }

    /// Status implied by the current task statuses
    pub fn derived_status(&self) -> PipelineStatus {
        PipelineStatus::derive(self.tasks().map(|task| task.status))
    }

    pub fn find_task(&self, task_id: i64) -> Option<&Task> {
        self.tasks().find(|task| task.id == task_id)
    }
}

/// New Pipeline for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCreate {
    pub name: String,
    pub creator_id: i64,
    pub stage_list: Vec<StageCreate>,
}
