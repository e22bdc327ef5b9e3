use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::TaskRunEvent,
    states::TaskRunStatus,
};

/// Determine the target status for a task run event
///
/// Terminal runs are immutable. `Unknown` runs may still be resolved by a
/// later report from the runner.
pub fn determine_run_target_state(
    current_state: TaskRunStatus,
    event: &TaskRunEvent,
) -> StateMachineResult<TaskRunStatus> {
    if current_state.is_terminal() {
        return Err(StateMachineError::TerminalState {
            entity: "task run",
            state: current_state.to_string(),
        });
    }

    let target = match (current_state, event) {
        (TaskRunStatus::Pending, TaskRunEvent::Start) => TaskRunStatus::Running,
        (TaskRunStatus::Pending, TaskRunEvent::Cancel) => TaskRunStatus::Canceled,

        (TaskRunStatus::Running | TaskRunStatus::Unknown, TaskRunEvent::Complete(_)) => {
            TaskRunStatus::Done
        }
        (TaskRunStatus::Running | TaskRunStatus::Unknown, TaskRunEvent::Fail(_)) => {
            TaskRunStatus::Failed
        }
        (TaskRunStatus::Running | TaskRunStatus::Unknown, TaskRunEvent::Cancel) => {
            TaskRunStatus::Canceled
        }

        (from_state, _) => return Err(invalid_transition(from_state, event.event_type())),
    };

    Ok(target)
}
