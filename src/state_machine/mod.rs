// Status machines for tasks and task runs
//
// Pure transition tables plus a store-backed task state machine that applies
// events with compare-and-set patches.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_run_state_machine;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{TaskEvent, TaskRunEvent};
pub use states::{TaskRunStatus, TaskStatus};
pub use task_run_state_machine::determine_run_target_state;
pub use task_state_machine::{determine_target_state, TaskStateMachine};
