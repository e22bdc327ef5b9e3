//! Store wrapper that injects faults and interleavings around an InMemoryStore

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use schemaflow_core::error::{ErrorCode, Result};
use schemaflow_core::models::{
    ApprovalPolicy, Database, Instance, Issue, Pipeline, PipelineCreate, Task, TaskCheckRun,
    TaskCheckRunCreate, TaskCheckRunFind, TaskCheckRunResultPayload, TaskCheckRunStatus,
    TaskCheckRunStatusPatch, TaskDag, TaskFind, TaskRun, TaskRunCreate, TaskRunStatusPatch,
    TaskStatusPatch,
};
use schemaflow_core::store::{InMemoryStore, Store};

pub struct HookedStore {
    pub inner: Arc<InMemoryStore>,
    panic_next_find: AtomicBool,
    finish_on_task_load: Mutex<Option<i64>>,
}

impl HookedStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            panic_next_find: AtomicBool::new(false),
            finish_on_task_load: Mutex::new(None),
        })
    }

    /// The next `find_task_check_runs` call panics instead of answering
    pub fn panic_on_next_find(&self) {
        self.panic_next_find.store(true, Ordering::SeqCst);
    }

    /// Mark the check run DONE behind the caller's back when its task is next loaded
    pub fn finish_run_on_task_load(&self, check_run_id: i64) {
        *self.finish_on_task_load.lock() = Some(check_run_id);
    }
}

#[async_trait]
impl Store for HookedStore {
    async fn create_pipeline_batch(&self, create: &PipelineCreate) -> Result<Pipeline> {
        self.inner.create_pipeline_batch(create).await
    }

    async fn get_pipeline(&self, id: i64) -> Result<Option<Pipeline>> {
        self.inner.get_pipeline(id).await
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let finish = self.finish_on_task_load.lock().take();
        if let Some(check_run_id) = finish {
            self.inner
                .patch_task_check_run_status(&TaskCheckRunStatusPatch {
                    id: check_run_id,
                    updater_id: 1,
                    status: TaskCheckRunStatus::Done,
                    code: ErrorCode::Ok,
                    result: TaskCheckRunResultPayload::default(),
                })
                .await?;
        }
        self.inner.get_task(id).await
    }

    async fn find_tasks(&self, find: &TaskFind) -> Result<Vec<Task>> {
        self.inner.find_tasks(find).await
    }

    async fn patch_task_status(&self, patch: TaskStatusPatch) -> Result<Task> {
        self.inner.patch_task_status(patch).await
    }

    async fn find_task_dags(&self, pipeline_id: i64) -> Result<Vec<TaskDag>> {
        self.inner.find_task_dags(pipeline_id).await
    }

    async fn create_task_run(&self, create: &TaskRunCreate) -> Result<TaskRun> {
        self.inner.create_task_run(create).await
    }

    async fn patch_task_run(&self, patch: &TaskRunStatusPatch) -> Result<TaskRun> {
        self.inner.patch_task_run(patch).await
    }

    async fn create_task_check_runs(&self, creates: &[TaskCheckRunCreate]) -> Result<Vec<TaskCheckRun>> {
        self.inner.create_task_check_runs(creates).await
    }

    async fn find_task_check_runs(&self, find: &TaskCheckRunFind) -> Result<Vec<TaskCheckRun>> {
        if self.panic_next_find.swap(false, Ordering::SeqCst) {
            panic!("check run table unreadable");
        }
        self.inner.find_task_check_runs(find).await
    }

    async fn patch_task_check_run_status(&self, patch: &TaskCheckRunStatusPatch) -> Result<TaskCheckRun> {
        self.inner.patch_task_check_run_status(patch).await
    }

    async fn get_database(&self, id: i64) -> Result<Option<Database>> {
        self.inner.get_database(id).await
    }

    async fn get_instance(&self, id: i64) -> Result<Option<Instance>> {
        self.inner.get_instance(id).await
    }

    async fn find_issue_by_pipeline(&self, pipeline_id: i64) -> Result<Option<Issue>> {
        self.inner.find_issue_by_pipeline(pipeline_id).await
    }

    async fn get_pipeline_approval_policy(&self, environment_id: i64) -> Result<ApprovalPolicy> {
        self.inner.get_pipeline_approval_policy(environment_id).await
    }

    async fn get_sql_review_policy_id(&self, environment_id: i64) -> Result<i64> {
        self.inner.get_sql_review_policy_id(environment_id).await
    }
}
