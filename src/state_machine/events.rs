use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that can trigger task status transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Checks are queued and the task now waits for an approver
    RequestApproval,
    /// The execution runner picked the task up
    Start,
    /// The statement was applied
    Complete,
    /// The run failed with an error message
    Fail(String),
    /// A user canceled the task
    Cancel,
    /// Re-arm a failed task so it becomes eligible again
    Retry,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RequestApproval => "request_approval",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that can trigger task run status transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskRunEvent {
    Start,
    /// Finished with optional execution artifacts
    Complete(Option<Value>),
    Fail(String),
    Cancel,
}

impl TaskRunEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract results if this is a completion event
    pub fn results(&self) -> Option<&Value> {
        match self {
            Self::Complete(results) => results.as_ref(),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}
