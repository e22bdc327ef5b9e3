use serde::{Deserialize, Serialize};

/// Dependency edge over batch-local task indices
///
/// The task at `to_index` may not start until the task at `from_index` is DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIndexDag {
    pub from_index: usize,
    pub to_index: usize,
}

impl TaskIndexDag {
    pub fn new(from_index: usize, to_index: usize) -> Self {
        Self {
            from_index,
            to_index,
        }
    }

    /// Shift both endpoints by the number of tasks placed before this group
    pub fn shifted(&self, offset: usize) -> Self {
        Self {
            from_index: self.from_index + offset,
            to_index: self.to_index + offset,
        }
    }

    /// Resolve indices against the ids the batch was persisted with
    pub fn remap(&self, task_ids: &[i64]) -> Option<TaskDag> {
        Some(TaskDag {
            from_task_id: *task_ids.get(self.from_index)?,
            to_task_id: *task_ids.get(self.to_index)?,
        })
    }
}

/// Dependency edge between persisted tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskDag {
    pub from_task_id: i64,
    pub to_task_id: i64,
}
