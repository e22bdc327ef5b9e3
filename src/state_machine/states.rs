use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status as persisted on the task row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, waiting for its stage to become active
    #[default]
    Pending,
    /// Checks passed or running, waiting for an approver
    PendingApproval,
    /// Picked up by the execution runner
    Running,
    /// Statement applied successfully
    Done,
    /// Last run failed; may be retried or canceled
    Failed,
    /// Canceled by a user
    Canceled,
}

impl TaskStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }

    /// Check if the task has stopped moving for now (terminal or failed)
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }

    /// Check if this task satisfies DAG edges pointing away from it
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if the task is waiting to be started
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Pending | Self::PendingApproval)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Status of one execution attempt of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRunStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
    Canceled,
    /// The runner lost track of the attempt; resolved by a later report
    Unknown,
}

impl TaskRunStatus {
    /// A terminal run is immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TaskRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(format!("Invalid task run status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_terminal_check() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(!TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::PendingApproval.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_failed_is_settled_but_not_terminal() {
        assert!(TaskStatus::Failed.is_settled());
        assert!(!TaskStatus::Running.is_settled());
        assert!(!TaskStatus::Failed.satisfies_dependencies());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(TaskStatus::PendingApproval.to_string(), "PENDING_APPROVAL");
        assert_eq!("CANCELED".parse::<TaskStatus>().unwrap(), TaskStatus::Canceled);
        assert!("cancelled".parse::<TaskStatus>().is_err());
        assert_eq!("UNKNOWN".parse::<TaskRunStatus>().unwrap(), TaskRunStatus::Unknown);
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&TaskStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"PENDING_APPROVAL\"");
        let parsed: TaskRunStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, TaskRunStatus::Failed);
    }
}
