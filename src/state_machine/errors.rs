use thiserror::Error;

/// Error types for status transitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("{entity} is in terminal state {state}")]
    TerminalState { entity: &'static str, state: String },

    #[error("{entity} {entity_id} changed concurrently: expected {expected}, found {actual}")]
    ConcurrentModification {
        entity: &'static str,
        entity_id: i64,
        expected: String,
        actual: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper function to create an invalid transition error
pub fn invalid_transition(from: impl ToString, event: impl Into<String>) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from: from.to_string(),
        event: event.into(),
    }
}
