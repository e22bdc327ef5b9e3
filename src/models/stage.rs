use serde::{Deserialize, Serialize};

use super::task::{Task, TaskCreate};
use super::task_dag::TaskIndexDag;
use crate::state_machine::TaskStatus;

/// Ordered group of tasks scoped to one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    /// Back-reference only
    pub pipeline_id: i64,
    pub environment_id: i64,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Stage {
    /// A stage begins when its first task leaves the waiting statuses
    pub fn has_begun(&self) -> bool {
        self.tasks
            .iter()
            .any(|task| !task.status.is_waiting() || !task.task_runs.is_empty())
    }

    /// Every task is DONE, FAILED or CANCELED
    ///
    /// A retry moves a task back to PENDING, so a stage can settle repeatedly.
    pub fn is_settled(&self) -> bool {
        self.tasks.iter().all(|task| task.status.is_settled())
    }

    /// Whether the stage still holds work, which makes it a candidate for the active stage
    pub fn has_unfinished_task(&self) -> bool {
        self.tasks.iter().any(|task| task.status != TaskStatus::Done)
    }
}

/// New Stage for creation, with its tasks and batch-local DAG edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCreate {
    pub name: String,
    pub environment_id: i64,
    pub task_list: Vec<TaskCreate>,
    pub task_index_dag_list: Vec<TaskIndexDag>,
}
