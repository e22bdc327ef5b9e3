use proptest::prelude::*;

use schemaflow_core::models::{StatementPayload, TaskCreate, TaskIndexDag, TaskPayload, TaskType};
use schemaflow_core::orchestration::TaskCreateGroup;
use schemaflow_core::state_machine::{TaskEvent, TaskStatus};

/// Strategy for generating filename-safe path tokens
pub fn path_token_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Strategy for generating arbitrary (mostly non-matching) file paths
pub fn file_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9_.#@ -]{0,12}", 0..5).prop_map(|parts| parts.join("/"))
}

/// Strategy for generating semantic versions within the stored range
pub fn semantic_version_strategy() -> impl Strategy<Value = (u64, u64, u64)> {
    (0u64..10_000, 0u64..10_000, 0u64..10_000)
}

pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::PendingApproval),
        Just(TaskStatus::Running),
        Just(TaskStatus::Done),
        Just(TaskStatus::Failed),
        Just(TaskStatus::Canceled),
    ]
}

pub fn task_event_strategy() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        Just(TaskEvent::RequestApproval),
        Just(TaskEvent::Start),
        Just(TaskEvent::Complete),
        "[a-z ]{0,20}".prop_map(TaskEvent::Fail),
        Just(TaskEvent::Cancel),
        Just(TaskEvent::Retry),
    ]
}

fn task_create(name: String) -> TaskCreate {
    TaskCreate {
        name,
        instance_id: 1,
        database_id: Some(1),
        status: TaskStatus::Pending,
        task_type: TaskType::SchemaUpdate,
        payload: TaskPayload::Statement(StatementPayload::default()),
        earliest_allowed_ts: 0,
        database_name: "db".to_string(),
    }
}

/// Strategy for one group of tasks with forward-only (acyclic) local edges
pub fn task_group_strategy() -> impl Strategy<Value = TaskCreateGroup> {
    (1usize..6)
        .prop_flat_map(|size| {
            let edges = prop::collection::vec((0..size, 0..size), 0..size * 2);
            (Just(size), edges)
        })
        .prop_map(|(size, pairs)| {
            let task_list = (0..size).map(|i| task_create(format!("task-{i}"))).collect();
            let task_index_dag_list = pairs
                .into_iter()
                .filter(|(from, to)| from < to)
                .map(|(from, to)| TaskIndexDag::new(from, to))
                .collect();
            TaskCreateGroup::new(task_list, task_index_dag_list)
        })
}

/// Strategy for several independently built groups
pub fn task_groups_strategy() -> impl Strategy<Value = Vec<TaskCreateGroup>> {
    prop::collection::vec(task_group_strategy(), 0..6)
}
