use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};
use crate::error::{Result, SchemaflowError};
use crate::models::{Task, TaskStatusPatch};
use crate::store::Store;

/// Determine the target status for a task event
///
/// `Done` and `Canceled` are sinks: every event applied to them is rejected.
pub fn determine_target_state(
    current_state: TaskStatus,
    event: &TaskEvent,
) -> StateMachineResult<TaskStatus> {
    if current_state.is_terminal() {
        return Err(StateMachineError::TerminalState {
            entity: "task",
            state: current_state.to_string(),
        });
    }

    let target = match (current_state, event) {
        (TaskStatus::Pending, TaskEvent::RequestApproval) => TaskStatus::PendingApproval,

        // Start transitions
        (TaskStatus::Pending, TaskEvent::Start) => TaskStatus::Running,
        (TaskStatus::PendingApproval, TaskEvent::Start) => TaskStatus::Running,
        (TaskStatus::Failed, TaskEvent::Start) => TaskStatus::Running,

        // Completion
        (TaskStatus::Running, TaskEvent::Complete) => TaskStatus::Done,
        (TaskStatus::Running, TaskEvent::Fail(_)) => TaskStatus::Failed,

        (TaskStatus::Failed, TaskEvent::Retry) => TaskStatus::Pending,

        // Cancel transitions
        (TaskStatus::Pending, TaskEvent::Cancel) => TaskStatus::Canceled,
        (TaskStatus::PendingApproval, TaskEvent::Cancel) => TaskStatus::Canceled,
        (TaskStatus::Failed, TaskEvent::Cancel) => TaskStatus::Canceled,

        (from_state, _) => return Err(invalid_transition(from_state, event.event_type())),
    };

    Ok(target)
}

/// Applies task events through the store
///
/// The patch carries the status the transition was computed from, so a
/// concurrent writer makes the transition fail instead of being overwritten.
pub struct TaskStateMachine {
    store: Arc<dyn Store>,
}

impl TaskStateMachine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Get the current status of a task
    pub async fn current_state(&self, task_id: i64) -> Result<TaskStatus> {
        self.load(task_id).await.map(|task| task.status)
    }

    /// Attempt to transition the task status
    #[instrument(skip(self, event), fields(event = event.event_type()))]
    pub async fn transition(&self, task_id: i64, event: TaskEvent, updater_id: i64) -> Result<Task> {
        let task = self.load(task_id).await?;
        let target = determine_target_state(task.status, &event)?;

        let patched = self
            .store
            .patch_task_status(TaskStatusPatch {
                id: task_id,
                expected: task.status,
                status: target,
                updater_id,
            })
            .await?;

        debug!(
            task_id = task_id,
            from = %task.status,
            to = %target,
            error = event.error_message().unwrap_or_default(),
            "Task transitioned"
        );

        Ok(patched)
    }

    async fn load(&self, task_id: i64) -> Result<Task> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| SchemaflowError::not_found("task", task_id))
    }
}
