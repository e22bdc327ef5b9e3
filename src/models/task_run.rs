use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;
use crate::state_machine::{
    determine_run_target_state, StateMachineResult, TaskRunEvent, TaskRunStatus,
};

/// One execution attempt of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: i64,
    pub task_id: i64,
    pub creator_id: i64,
    pub created_ts: DateTime<Utc>,
    pub updated_ts: DateTime<Utc>,
    pub name: String,
    pub status: TaskRunStatus,
    pub code: ErrorCode,
    /// Execution artifacts, or the error detail of a failed run
    pub result: Option<Value>,
}

impl TaskRun {
    /// Apply an event, recording its artifacts
    ///
    /// A terminal run is left untouched and the event is rejected.
    pub fn finish(&mut self, event: &TaskRunEvent) -> StateMachineResult<TaskRunStatus> {
        let target = determine_run_target_state(self.status, event)?;

        match event {
            TaskRunEvent::Complete(result) => {
                self.code = ErrorCode::Ok;
                self.result = result.clone();
            }
            TaskRunEvent::Fail(detail) => {
                self.code = ErrorCode::Internal;
                self.result = Some(serde_json::json!({ "detail": detail }));
            }
            TaskRunEvent::Start | TaskRunEvent::Cancel => {}
        }

        self.status = target;
        self.updated_ts = Utc::now();
        Ok(target)
    }
}

/// New TaskRun for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunCreate {
    pub task_id: i64,
    pub creator_id: i64,
    pub name: String,
}

/// Status update for a task run
#[derive(Debug, Clone)]
pub struct TaskRunStatusPatch {
    pub id: i64,
    pub updater_id: i64,
    pub event: TaskRunEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: TaskRunStatus) -> TaskRun {
        TaskRun {
            id: 1,
            task_id: 1,
            creator_id: 1,
            created_ts: Utc::now(),
            updated_ts: Utc::now(),
            name: "run".to_string(),
            status,
            code: ErrorCode::Ok,
            result: None,
        }
    }

    #[test]
    fn test_finish_records_failure_detail() {
        let mut task_run = run(TaskRunStatus::Running);
        let status = task_run.finish(&TaskRunEvent::Fail("syntax error".to_string())).unwrap();
        assert_eq!(status, TaskRunStatus::Failed);
        assert_eq!(task_run.code, ErrorCode::Internal);
        assert_eq!(task_run.result.as_ref().unwrap()["detail"], "syntax error");
    }

    #[test]
    fn test_terminal_run_is_not_mutated() {
        let mut task_run = run(TaskRunStatus::Done);
        task_run.result = Some(serde_json::json!({ "detail": "applied" }));
        let before = task_run.clone();

        assert!(task_run.finish(&TaskRunEvent::Fail("late".to_string())).is_err());
        assert_eq!(task_run, before);
    }
}
