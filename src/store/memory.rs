use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::Store;
use crate::error::{ErrorCode, Result, SchemaflowError};
use crate::models::{
    ApprovalPolicy, Database, Instance, Issue, Pipeline, PipelineCreate, PipelineStatus, Stage,
    Task, TaskCheckRun, TaskCheckRunCreate, TaskCheckRunFind, TaskCheckRunStatus,
    TaskCheckRunStatusPatch, TaskDag, TaskFind, TaskRun, TaskRunCreate, TaskRunStatusPatch,
    TaskStatusPatch,
};
use crate::orchestration::errors::WorkflowError;
use crate::state_machine::{StateMachineError, TaskRunStatus};

#[derive(Debug, Clone)]
struct PipelineRow {
    id: i64,
    name: String,
    creator_id: i64,
    created_ts: chrono::DateTime<Utc>,
    stage_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct StageRow {
    id: i64,
    pipeline_id: i64,
    environment_id: i64,
    name: String,
    task_ids: Vec<i64>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    pipelines: HashMap<i64, PipelineRow>,
    stages: HashMap<i64, StageRow>,
    /// Task rows; runs live in `task_runs` and are joined on read
    tasks: BTreeMap<i64, Task>,
    task_runs: BTreeMap<i64, TaskRun>,
    task_dags: Vec<(i64, TaskDag)>,
    check_runs: BTreeMap<i64, TaskCheckRun>,
    databases: HashMap<i64, Database>,
    instances: HashMap<i64, Instance>,
    issues: HashMap<i64, Issue>,
    approval_policies: HashMap<i64, ApprovalPolicy>,
    review_policies: HashMap<i64, i64>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn load_task(&self, id: i64) -> Option<Task> {
        let mut task = self.tasks.get(&id)?.clone();
        task.task_runs = self
            .task_runs
            .values()
            .filter(|run| run.task_id == id)
            .cloned()
            .collect();
        Some(task)
    }

    fn load_pipeline(&self, id: i64) -> Option<Pipeline> {
        let row = self.pipelines.get(&id)?;
        let stages: Vec<Stage> = row
            .stage_ids
            .iter()
            .filter_map(|stage_id| self.stages.get(stage_id))
            .map(|stage| Stage {
                id: stage.id,
                pipeline_id: stage.pipeline_id,
                environment_id: stage.environment_id,
                name: stage.name.clone(),
                tasks: stage
                    .task_ids
                    .iter()
                    .filter_map(|task_id| self.load_task(*task_id))
                    .collect(),
            })
            .collect();

        let mut pipeline = Pipeline {
            id: row.id,
            name: row.name.clone(),
            status: PipelineStatus::Open,
            creator_id: row.creator_id,
            created_ts: row.created_ts,
            stages,
        };
        pipeline.status = pipeline.derived_status();
        Some(pipeline)
    }
}

/// Process-local store guarded by a single lock
///
/// Every operation runs under one lock acquisition, so batch creation and
/// compare-and-set patches are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_instance(&self, instance: Instance) {
        self.tables.write().instances.insert(instance.id, instance);
    }

    pub fn insert_database(&self, database: Database) {
        self.tables.write().databases.insert(database.id, database);
    }

    pub fn insert_issue(&self, issue: Issue) {
        self.tables.write().issues.insert(issue.pipeline_id, issue);
    }

    pub fn set_approval_policy(&self, environment_id: i64, policy: ApprovalPolicy) {
        self.tables
            .write()
            .approval_policies
            .insert(environment_id, policy);
    }

    pub fn set_sql_review_policy(&self, environment_id: i64, policy_id: i64) {
        self.tables
            .write()
            .review_policies
            .insert(environment_id, policy_id);
    }

    /// Drop a task row, as if it were deleted behind the scheduler's back
    pub fn remove_task(&self, id: i64) -> Option<Task> {
        self.tables.write().tasks.remove(&id)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_pipeline_batch(&self, create: &PipelineCreate) -> Result<Pipeline> {
        let mut tables = self.tables.write();

        // Reject the whole batch before anything is written
        for stage in &create.stage_list {
            let task_count = stage.task_list.len();
            if let Some(edge) = stage
                .task_index_dag_list
                .iter()
                .find(|edge| edge.from_index >= task_count || edge.to_index >= task_count)
            {
                return Err(WorkflowError::DagIndexOutOfRange {
                    stage: stage.name.clone(),
                    from_index: edge.from_index,
                    to_index: edge.to_index,
                    task_count,
                }
                .into());
            }
        }

        let now = Utc::now();
        let pipeline_id = tables.allocate_id();
        let mut stage_ids = Vec::with_capacity(create.stage_list.len());

        for stage_create in &create.stage_list {
            let stage_id = tables.allocate_id();
            let mut task_ids = Vec::with_capacity(stage_create.task_list.len());

            for task_create in &stage_create.task_list {
                let task_id = tables.allocate_id();
                tables.tasks.insert(
                    task_id,
                    Task {
                        id: task_id,
                        pipeline_id,
                        stage_id,
                        instance_id: task_create.instance_id,
                        database_id: task_create.database_id,
                        name: task_create.name.clone(),
                        status: task_create.status,
                        task_type: task_create.task_type,
                        payload: task_create.payload.clone(),
                        earliest_allowed_ts: task_create.earliest_allowed_ts,
                        creator_id: create.creator_id,
                        created_ts: now,
                        updated_ts: now,
                        task_runs: Vec::new(),
                    },
                );
                task_ids.push(task_id);
            }

            let edges: Vec<TaskDag> = stage_create
                .task_index_dag_list
                .iter()
                .filter_map(|edge| edge.remap(&task_ids))
                .collect();
            tables
                .task_dags
                .extend(edges.into_iter().map(|edge| (pipeline_id, edge)));

            tables.stages.insert(
                stage_id,
                StageRow {
                    id: stage_id,
                    pipeline_id,
                    environment_id: stage_create.environment_id,
                    name: stage_create.name.clone(),
                    task_ids,
                },
            );
            stage_ids.push(stage_id);
        }

        tables.pipelines.insert(
            pipeline_id,
            PipelineRow {
                id: pipeline_id,
                name: create.name.clone(),
                creator_id: create.creator_id,
                created_ts: now,
                stage_ids,
            },
        );

        debug!(pipeline_id = pipeline_id, "Created pipeline batch");
        tables
            .load_pipeline(pipeline_id)
            .ok_or_else(|| SchemaflowError::not_found("pipeline", pipeline_id))
    }

    async fn get_pipeline(&self, id: i64) -> Result<Option<Pipeline>> {
        Ok(self.tables.read().load_pipeline(id))
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.tables.read().load_task(id))
    }

    async fn find_tasks(&self, find: &TaskFind) -> Result<Vec<Task>> {
        let tables = self.tables.read();
        Ok(tables
            .tasks
            .values()
            .filter(|task| find.pipeline_id.map_or(true, |id| task.pipeline_id == id))
            .filter(|task| find.stage_id.map_or(true, |id| task.stage_id == id))
            .filter(|task| {
                find.status_list
                    .as_ref()
                    .map_or(true, |list| list.contains(&task.status))
            })
            .filter_map(|task| tables.load_task(task.id))
            .collect())
    }

    async fn patch_task_status(&self, patch: TaskStatusPatch) -> Result<Task> {
        let mut tables = self.tables.write();
        let task = tables
            .tasks
            .get_mut(&patch.id)
            .ok_or_else(|| SchemaflowError::not_found("task", patch.id))?;

        if task.status != patch.expected {
            return Err(StateMachineError::ConcurrentModification {
                entity: "task",
                entity_id: patch.id,
                expected: patch.expected.to_string(),
                actual: task.status.to_string(),
            }
            .into());
        }
        task.status = patch.status;
        task.updated_ts = Utc::now();

        tables
            .load_task(patch.id)
            .ok_or_else(|| SchemaflowError::not_found("task", patch.id))
    }

    async fn find_task_dags(&self, pipeline_id: i64) -> Result<Vec<TaskDag>> {
        Ok(self
            .tables
            .read()
            .task_dags
            .iter()
            .filter(|(id, _)| *id == pipeline_id)
            .map(|(_, edge)| *edge)
            .collect())
    }

    async fn create_task_run(&self, create: &TaskRunCreate) -> Result<TaskRun> {
        let mut tables = self.tables.write();
        if !tables.tasks.contains_key(&create.task_id) {
            return Err(SchemaflowError::not_found("task", create.task_id));
        }

        let now = Utc::now();
        let id = tables.allocate_id();
        let run = TaskRun {
            id,
            task_id: create.task_id,
            creator_id: create.creator_id,
            created_ts: now,
            updated_ts: now,
            name: create.name.clone(),
            status: TaskRunStatus::Pending,
            code: ErrorCode::Ok,
            result: None,
        };
        tables.task_runs.insert(id, run.clone());
        Ok(run)
    }

    async fn patch_task_run(&self, patch: &TaskRunStatusPatch) -> Result<TaskRun> {
        let mut tables = self.tables.write();
        let run = tables
            .task_runs
            .get_mut(&patch.id)
            .ok_or_else(|| SchemaflowError::not_found("task run", patch.id))?;
        run.finish(&patch.event)?;
        Ok(run.clone())
    }

    async fn create_task_check_runs(&self, creates: &[TaskCheckRunCreate]) -> Result<Vec<TaskCheckRun>> {
        let mut tables = self.tables.write();
        if let Some(missing) = creates
            .iter()
            .find(|create| !tables.tasks.contains_key(&create.task_id))
        {
            return Err(SchemaflowError::not_found("task", missing.task_id));
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(creates.len());
        for create in creates {
            let id = tables.allocate_id();
            let run = TaskCheckRun {
                id,
                task_id: create.task_id,
                creator_id: create.creator_id,
                created_ts: now,
                updater_id: create.creator_id,
                updated_ts: now,
                check_type: create.check_type,
                status: TaskCheckRunStatus::Queued,
                code: ErrorCode::Ok,
                payload: create.payload.clone(),
                result: None,
            };
            tables.check_runs.insert(id, run.clone());
            created.push(run);
        }
        Ok(created)
    }

    async fn find_task_check_runs(&self, find: &TaskCheckRunFind) -> Result<Vec<TaskCheckRun>> {
        Ok(self
            .tables
            .read()
            .check_runs
            .values()
            .filter(|run| find.task_id.map_or(true, |id| run.task_id == id))
            .filter(|run| {
                find.status_list
                    .as_ref()
                    .map_or(true, |list| list.contains(&run.status))
            })
            .cloned()
            .collect())
    }

    async fn patch_task_check_run_status(&self, patch: &TaskCheckRunStatusPatch) -> Result<TaskCheckRun> {
        let mut tables = self.tables.write();
        let run = tables
            .check_runs
            .get_mut(&patch.id)
            .ok_or_else(|| SchemaflowError::not_found("task check run", patch.id))?;

        if run.status.is_terminal() {
            return Err(StateMachineError::TerminalState {
                entity: "task check run",
                state: format!("{:?}", run.status),
            }
            .into());
        }
        run.status = patch.status;
        run.code = patch.code;
        run.result = Some(patch.result.clone());
        run.updater_id = patch.updater_id;
        run.updated_ts = Utc::now();
        Ok(run.clone())
    }

    async fn get_database(&self, id: i64) -> Result<Option<Database>> {
        Ok(self.tables.read().databases.get(&id).cloned())
    }

    async fn get_instance(&self, id: i64) -> Result<Option<Instance>> {
        Ok(self.tables.read().instances.get(&id).cloned())
    }

    async fn find_issue_by_pipeline(&self, pipeline_id: i64) -> Result<Option<Issue>> {
        Ok(self.tables.read().issues.get(&pipeline_id).cloned())
    }

    async fn get_pipeline_approval_policy(&self, environment_id: i64) -> Result<ApprovalPolicy> {
        Ok(self
            .tables
            .read()
            .approval_policies
            .get(&environment_id)
            .copied()
            .unwrap_or_default())
    }

    async fn get_sql_review_policy_id(&self, environment_id: i64) -> Result<i64> {
        self.tables
            .read()
            .review_policies
            .get(&environment_id)
            .copied()
            .ok_or_else(|| SchemaflowError::not_found("sql review policy", environment_id))
    }
}
