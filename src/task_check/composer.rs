//! # Check-Set Composition
//!
//! Decides which checks a task needs and queues them as one batch. Every
//! statement-changing task gets the connectivity and bookkeeping checks, plus
//! whichever statement checks its engine supports. Approval, restore and
//! gh-ost checks are added by task type and by project settings.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::constants::SYSTEM_BOT_ID;
use crate::error::Result;
use crate::models::{
    ApprovalPolicy, LgtmCheckSetting, Pipeline, StatementAdvisePayload, StatementCheckPayload,
    Task, TaskCheckPayload, TaskCheckRun, TaskCheckRunCreate, TaskCheckType, TaskType,
};
use crate::orchestration::errors::WorkflowError;
use crate::store::Store;

/// Licensed capabilities that change which checks are queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Require an LGTM comment on the issue before rollout
    Lgtm,
}

pub trait LicenseService: Send + Sync {
    fn is_feature_enabled(&self, feature: Feature) -> bool;
}

/// Fixed feature set, for embedding without a license server and for tests
#[derive(Debug, Clone, Default)]
pub struct StaticLicenseService {
    enabled: HashSet<Feature>,
}

impl StaticLicenseService {
    pub fn new<I: IntoIterator<Item = Feature>>(features: I) -> Self {
        Self {
            enabled: features.into_iter().collect(),
        }
    }
}

impl LicenseService for StaticLicenseService {
    fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }
}

pub struct TaskCheckComposer {
    store: Arc<dyn Store>,
    license: Arc<dyn LicenseService>,
}

impl std::fmt::Debug for TaskCheckComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCheckComposer")
            .field("lgtm", &self.license.is_feature_enabled(Feature::Lgtm))
            .finish()
    }
}

impl TaskCheckComposer {
    pub fn new(store: Arc<dyn Store>, license: Arc<dyn LicenseService>) -> Self {
        Self { store, license }
    }

    /// The checks `task` needs, in the order they are queued
    ///
    /// `creator_id` is recorded on the approval, restore, connectivity and
    /// gh-ost checks; statement checks are always created by the system bot.
    pub async fn get_task_check(&self, task: &Task, creator_id: i64) -> Result<Vec<TaskCheckRunCreate>> {
        let instance = self
            .store
            .get_instance(task.instance_id)
            .await?
            .ok_or(WorkflowError::MissingCatalogEntry {
                entity: "instance",
                id: task.instance_id,
                task_id: task.id,
            })?;

        let mut creates = Vec::new();
        let check = |check_type, creator_id| TaskCheckRunCreate {
            task_id: task.id,
            creator_id,
            check_type,
            payload: TaskCheckPayload::Empty,
        };

        if self.needs_lgtm_check(task, instance.environment_id).await? {
            creates.push(check(TaskCheckType::IssueLgtm, creator_id));
        }

        if task.task_type == TaskType::RestorePitrRestore {
            creates.push(check(TaskCheckType::PitrMysql, creator_id));
        }

        if !task.task_type.is_statement_change() {
            return Ok(creates);
        }

        creates.push(check(TaskCheckType::DatabaseConnect, creator_id));
        creates.push(check(TaskCheckType::InstanceMigrationSchema, creator_id));

        if task.task_type == TaskType::SchemaUpdateGhostSync {
            creates.push(check(TaskCheckType::GhostSync, creator_id));
        }

        let database_id = task
            .database_id
            .ok_or(WorkflowError::MissingDatabase { task_id: task.id })?;
        let database = self
            .store
            .get_database(database_id)
            .await?
            .ok_or(WorkflowError::MissingCatalogEntry {
                entity: "database",
                id: database_id,
                task_id: task.id,
            })?;

        let statement = task.payload.statement().unwrap_or_default().to_string();
        let statement_check = || StatementCheckPayload {
            statement: statement.clone(),
            db_type: instance.engine,
            charset: database.character_set.clone(),
            collation: database.collation.clone(),
        };

        if instance.engine.supports_syntax_check() {
            creates.push(TaskCheckRunCreate {
                payload: TaskCheckPayload::StatementSyntax(statement_check()),
                ..check(TaskCheckType::StatementSyntax, SYSTEM_BOT_ID)
            });
        }

        if instance.engine.supports_sql_review() {
            let policy_id = self
                .store
                .get_sql_review_policy_id(database.environment_id)
                .await?;
            creates.push(TaskCheckRunCreate {
                payload: TaskCheckPayload::StatementAdvise(StatementAdvisePayload {
                    statement: statement.clone(),
                    db_type: instance.engine,
                    charset: database.character_set.clone(),
                    collation: database.collation.clone(),
                    policy_id,
                }),
                ..check(TaskCheckType::StatementAdvise, SYSTEM_BOT_ID)
            });
        }

        if instance.engine.supports_statement_type_check() {
            creates.push(TaskCheckRunCreate {
                payload: TaskCheckPayload::StatementType(statement_check()),
                ..check(TaskCheckType::StatementType, SYSTEM_BOT_ID)
            });
        }

        Ok(creates)
    }

    /// Queue the checks of one task as a single batch
    #[instrument(skip(self, task), fields(task_id = task.id, task_type = %task.task_type))]
    pub async fn schedule_check(&self, task: &Task, creator_id: i64) -> Result<Vec<TaskCheckRun>> {
        let creates = self.get_task_check(task, creator_id).await?;
        if creates.is_empty() {
            return Ok(Vec::new());
        }
        let created = self.store.create_task_check_runs(&creates).await?;
        debug!(check_runs = created.len(), "Queued task checks");
        Ok(created)
    }

    /// Queue the checks of every task in the pipeline as a single batch
    pub async fn schedule_pipeline_task_check(&self, pipeline: &Pipeline) -> Result<Vec<TaskCheckRun>> {
        let mut creates = Vec::new();
        for task in pipeline.tasks() {
            creates.extend(self.get_task_check(task, SYSTEM_BOT_ID).await?);
        }
        if creates.is_empty() {
            return Ok(Vec::new());
        }
        let created = self.store.create_task_check_runs(&creates).await?;
        debug!(
            pipeline_id = pipeline.id,
            check_runs = created.len(),
            "Queued pipeline task checks"
        );
        Ok(created)
    }

    async fn needs_lgtm_check(&self, task: &Task, environment_id: i64) -> Result<bool> {
        if !self.license.is_feature_enabled(Feature::Lgtm) {
            return Ok(false);
        }
        let Some(issue) = self.store.find_issue_by_pipeline(task.pipeline_id).await? else {
            return Ok(false);
        };
        if issue.lgtm_check == LgtmCheckSetting::Disabled {
            return Ok(false);
        }
        let policy = self.store.get_pipeline_approval_policy(environment_id).await?;
        Ok(policy != ApprovalPolicy::ManualApprovalNever)
    }
}
