//! Test data builders over the in-memory store

use std::sync::Arc;

use schemaflow_core::models::{
    Database, DbType, Instance, Pipeline, PipelineCreate, StageCreate, StatementPayload,
    TaskCreate, TaskIndexDag, TaskPayload, TaskType,
};
use schemaflow_core::state_machine::TaskStatus;
use schemaflow_core::store::{InMemoryStore, Store};

pub const ENVIRONMENT_ID: i64 = 10;
pub const INSTANCE_ID: i64 = 1;
pub const DATABASE_ID: i64 = 2;
pub const REVIEW_POLICY_ID: i64 = 77;

pub fn instance(id: i64, engine: DbType) -> Instance {
    Instance {
        id,
        environment_id: ENVIRONMENT_ID,
        name: format!("instance-{id}"),
        engine,
        host: "127.0.0.1".to_string(),
        port: "3306".to_string(),
        username: "admin".to_string(),
        password: "secret".to_string(),
    }
}

pub fn database(id: i64, instance_id: i64, name: &str) -> Database {
    Database {
        id,
        instance_id,
        project_id: 1,
        environment_id: ENVIRONMENT_ID,
        name: name.to_string(),
        character_set: "utf8mb4".to_string(),
        collation: "utf8mb4_general_ci".to_string(),
    }
}

/// Store with one instance of `engine`, one database "shop" and a review policy
pub fn seeded_store(engine: DbType) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.insert_instance(instance(INSTANCE_ID, engine));
    store.insert_database(database(DATABASE_ID, INSTANCE_ID, "shop"));
    store.set_sql_review_policy(ENVIRONMENT_ID, REVIEW_POLICY_ID);
    store
}

/// Builder for a TaskCreate against the seeded database
pub struct TaskCreateBuilder {
    create: TaskCreate,
}

impl TaskCreateBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            create: TaskCreate {
                name: name.to_string(),
                instance_id: INSTANCE_ID,
                database_id: Some(DATABASE_ID),
                status: TaskStatus::Pending,
                task_type: TaskType::SchemaUpdate,
                payload: TaskPayload::Statement(StatementPayload {
                    statement: "ALTER TABLE t ADD COLUMN c INT".to_string(),
                    ..Default::default()
                }),
                earliest_allowed_ts: 0,
                database_name: "shop".to_string(),
            },
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.create.status = status;
        self
    }

    pub fn with_type(mut self, task_type: TaskType, payload: TaskPayload) -> Self {
        self.create.task_type = task_type;
        self.create.payload = payload;
        self
    }

    pub fn with_instance(mut self, instance_id: i64) -> Self {
        self.create.instance_id = instance_id;
        self
    }

    pub fn build(self) -> TaskCreate {
        self.create
    }
}

/// Builder for a multi-stage PipelineCreate
pub struct PipelineBuilder {
    create: PipelineCreate,
}

impl PipelineBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            create: PipelineCreate {
                name: name.to_string(),
                creator_id: 100,
                stage_list: Vec::new(),
            },
        }
    }

    pub fn stage(mut self, name: &str, task_list: Vec<TaskCreate>, edges: Vec<TaskIndexDag>) -> Self {
        self.create.stage_list.push(StageCreate {
            name: name.to_string(),
            environment_id: ENVIRONMENT_ID,
            task_list,
            task_index_dag_list: edges,
        });
        self
    }

    pub fn build(self) -> PipelineCreate {
        self.create
    }

    pub async fn persist(self, store: &dyn Store) -> Pipeline {
        store
            .create_pipeline_batch(&self.create)
            .await
            .expect("Failed to create test pipeline")
    }
}

/// `count` independent schema update tasks in one stage
pub async fn pipeline_with_tasks(store: &dyn Store, count: usize) -> Pipeline {
    let tasks = (0..count)
        .map(|i| TaskCreateBuilder::new(&format!("task-{i}")).build())
        .collect();
    PipelineBuilder::new("deploy")
        .stage("prod", tasks, Vec::new())
        .persist(store)
        .await
}
