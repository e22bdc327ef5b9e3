//! # Task Check Scheduler
//!
//! Polling loop that drains queued check runs. Each tick loads every run in
//! `Queued` status and dispatches the ones it can admit onto a worker:
//!
//! 1. runs whose type has no executor are logged and left queued
//! 2. runs already in flight are skipped
//! 3. a run whose task cannot be loaded is marked FAILED with an internal code
//! 4. runs whose instance is at its connection cap, or arriving while the
//!    worker pool is full, wait for a later tick
//! 5. an admitted run is re-read and dropped if a worker finished it after
//!    the tick listed it
//! 6. admitted runs execute on a worker that writes DONE or FAILED and then
//!    releases its admission
//!
//! Workers live in a [`JoinSet`] owned by the scheduler, so [`TaskCheckScheduler::shutdown`]
//! aborts them. An aborted run stays queued and is picked up again after restart.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::executor::TaskCheckExecutor;
use super::registry::ExecutorRegistry;
use super::state::{AdmissionDenied, CheckRunPermit, SchedulerState};
use crate::config::SchedulerConfig;
use crate::constants::SYSTEM_BOT_ID;
use crate::error::{ErrorCode, Result, SchemaflowError};
use crate::state_machine::StateMachineError;
use crate::models::{
    Task, TaskCheckRun, TaskCheckRunFind, TaskCheckRunResultPayload, TaskCheckRunStatus,
    TaskCheckRunStatusPatch,
};
use crate::store::Store;

/// What one tick did with the queued runs it saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub queued: usize,
    pub dispatched: usize,
    pub skipped_unknown_type: usize,
    pub skipped_in_flight: usize,
    pub skipped_instance_busy: usize,
    pub skipped_pool_full: usize,
    pub skipped_already_finished: usize,
    pub failed_task_load: usize,
}

pub struct TaskCheckScheduler {
    store: Arc<dyn Store>,
    registry: Arc<ExecutorRegistry>,
    state: Arc<SchedulerState>,
    config: SchedulerConfig,
    worker_slots: Arc<Semaphore>,
    workers: Mutex<JoinSet<()>>,
    running: AtomicBool,
    shutdown_notify: Arc<Notify>,
}

impl std::fmt::Debug for TaskCheckScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCheckScheduler")
            .field("registry", &self.registry)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

impl TaskCheckScheduler {
    pub fn new(store: Arc<dyn Store>, registry: ExecutorRegistry, config: SchedulerConfig) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            state: Arc::new(SchedulerState::new(config.instance_max_connections)),
            worker_slots: Arc::new(Semaphore::new(config.max_concurrent_checks)),
            config,
            workers: Mutex::new(JoinSet::new()),
            running: AtomicBool::new(false),
            shutdown_notify: Arc::new(Notify::new()),
        }
    }

    /// Admission bookkeeping, for inspection
    pub fn state(&self) -> &Arc<SchedulerState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Poll until [`shutdown`](Self::shutdown) is called
    ///
    /// A panic inside a tick is logged and the next tick runs as usual.
    pub async fn run(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(SchemaflowError::TaskCheck(
                "task check scheduler is already running".to_string(),
            ));
        }

        info!(
            interval_ms = self.config.interval_ms,
            instance_max_connections = self.config.instance_max_connections,
            check_types = ?self.registry.registered_types(),
            "Task check scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match AssertUnwindSafe(self.tick()).catch_unwind().await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "Task check scheduler tick failed"),
                        Err(panic) => error!(
                            panic = %panic_message(panic.as_ref()),
                            "Task check scheduler PANIC RECOVER"
                        ),
                    }
                    self.reap_finished().await;
                }
                _ = self.shutdown_notify.notified() => {
                    debug!("Shutdown notification received");
                    break;
                }
            }
            if !self.is_running() {
                break;
            }
        }

        let aborted = self.abort_workers().await;
        self.running.store(false, Ordering::Release);
        info!(aborted_workers = aborted, "Task check scheduler stopped");
        Ok(())
    }

    /// Stop the loop before its next tick and abort in-flight workers
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.shutdown_notify.notify_one();
    }

    /// One pass over the queued check runs
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickSummary> {
        let queued = self
            .store
            .find_task_check_runs(&TaskCheckRunFind {
                status_list: Some(vec![TaskCheckRunStatus::Queued]),
                ..Default::default()
            })
            .await?;

        let mut summary = TickSummary {
            queued: queued.len(),
            ..Default::default()
        };

        for check_run in queued {
            let Some(executor) = self.registry.get(check_run.check_type) else {
                error!(
                    task_check_run_id = check_run.id,
                    task_id = check_run.task_id,
                    check_type = %check_run.check_type,
                    "Skip running task check run with unknown type"
                );
                summary.skipped_unknown_type += 1;
                continue;
            };

            if self.state.is_in_flight(check_run.id) {
                summary.skipped_in_flight += 1;
                continue;
            }

            let task = match self.store.get_task(check_run.task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    self.fail_unloadable(&check_run, SchemaflowError::not_found("task", check_run.task_id))
                        .await;
                    summary.failed_task_load += 1;
                    continue;
                }
                Err(e) => {
                    self.fail_unloadable(&check_run, e).await;
                    summary.failed_task_load += 1;
                    continue;
                }
            };

            let Ok(slot) = Arc::clone(&self.worker_slots).try_acquire_owned() else {
                debug!(task_check_run_id = check_run.id, "Worker pool full, deferring check run");
                summary.skipped_pool_full += 1;
                continue;
            };

            let permit = match self.state.try_admit(check_run.id, task.instance_id) {
                Ok(permit) => permit,
                Err(AdmissionDenied::InFlight) => {
                    summary.skipped_in_flight += 1;
                    continue;
                }
                Err(AdmissionDenied::InstanceBusy) => {
                    debug!(
                        task_check_run_id = check_run.id,
                        instance_id = task.instance_id,
                        "Instance at connection cap, deferring check run"
                    );
                    summary.skipped_instance_busy += 1;
                    continue;
                }
            };

            // the listing may predate a worker that finished this run and released its admission
            match self.is_still_queued(&check_run).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        task_check_run_id = check_run.id,
                        "Check run finished since it was listed, skipping"
                    );
                    summary.skipped_already_finished += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        task_check_run_id = check_run.id,
                        error = %e,
                        "Failed to re-read task check run, deferring"
                    );
                    continue;
                }
            }

            debug!(
                task_check_run_id = check_run.id,
                task_id = task.id,
                check_type = %check_run.check_type,
                instance_id = task.instance_id,
                "Dispatching task check run"
            );
            let worker = run_check(
                Arc::clone(&self.store),
                Arc::clone(executor),
                check_run,
                task,
                permit,
                slot,
            );
            self.workers.lock().await.spawn(worker);
            summary.dispatched += 1;
        }

        Ok(summary)
    }

    /// Wait for every dispatched worker to finish
    pub async fn wait_for_workers(&self) {
        let mut workers = self.workers.lock().await;
        while let Some(joined) = workers.join_next().await {
            log_join_error(joined);
        }
    }

    async fn reap_finished(&self) {
        let mut workers = self.workers.lock().await;
        while let Some(joined) = workers.try_join_next() {
            log_join_error(joined);
        }
    }

    async fn abort_workers(&self) -> usize {
        let mut workers = self.workers.lock().await;
        let outstanding = workers.len();
        workers.abort_all();
        while workers.join_next().await.is_some() {}
        outstanding
    }

    async fn is_still_queued(&self, check_run: &TaskCheckRun) -> Result<bool> {
        let queued = self
            .store
            .find_task_check_runs(&TaskCheckRunFind {
                task_id: Some(check_run.task_id),
                status_list: Some(vec![TaskCheckRunStatus::Queued]),
            })
            .await?;
        Ok(queued.iter().any(|run| run.id == check_run.id))
    }

    async fn fail_unloadable(&self, check_run: &TaskCheckRun, err: SchemaflowError) {
        error!(
            task_check_run_id = check_run.id,
            task_id = check_run.task_id,
            check_type = %check_run.check_type,
            error = %err,
            "Failed to get task for task check run"
        );
        let patch = TaskCheckRunStatusPatch {
            id: check_run.id,
            updater_id: SYSTEM_BOT_ID,
            status: TaskCheckRunStatus::Failed,
            code: ErrorCode::Internal,
            result: TaskCheckRunResultPayload {
                detail: err.to_string(),
                result_list: Vec::new(),
            },
        };
        if let Err(e) = self.store.patch_task_check_run_status(&patch).await {
            error!(
                task_check_run_id = check_run.id,
                error = %e,
                "Failed to mark task check run as FAILED"
            );
        }
    }
}

/// Worker body; the admission and pool slot are released when it returns
async fn run_check(
    store: Arc<dyn Store>,
    executor: Arc<dyn TaskCheckExecutor>,
    check_run: TaskCheckRun,
    task: Task,
    _permit: CheckRunPermit,
    _slot: OwnedSemaphorePermit,
) {
    let outcome = AssertUnwindSafe(executor.run(&check_run, &task))
        .catch_unwind()
        .await;

    let (status, code, result) = match outcome {
        Ok(Ok(result_list)) => {
            info!(
                task_check_run_id = check_run.id,
                task_id = task.id,
                check_type = %check_run.check_type,
                results = result_list.len(),
                "Task check run finished"
            );
            (
                TaskCheckRunStatus::Done,
                ErrorCode::Ok,
                TaskCheckRunResultPayload {
                    detail: String::new(),
                    result_list,
                },
            )
        }
        Ok(Err(e)) => {
            warn!(
                task_check_run_id = check_run.id,
                task_id = task.id,
                check_type = %check_run.check_type,
                error = %e,
                "Failed to run task check"
            );
            (
                TaskCheckRunStatus::Failed,
                e.code(),
                TaskCheckRunResultPayload {
                    detail: e.to_string(),
                    result_list: Vec::new(),
                },
            )
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(
                task_check_run_id = check_run.id,
                task_id = task.id,
                check_type = %check_run.check_type,
                panic = %message,
                "Task check executor panicked"
            );
            (
                TaskCheckRunStatus::Failed,
                ErrorCode::Internal,
                TaskCheckRunResultPayload {
                    detail: format!("executor panicked: {message}"),
                    result_list: Vec::new(),
                },
            )
        }
    };

    let patch = TaskCheckRunStatusPatch {
        id: check_run.id,
        updater_id: SYSTEM_BOT_ID,
        status,
        code,
        result,
    };
    match store.patch_task_check_run_status(&patch).await {
        Ok(_) => {}
        Err(SchemaflowError::StateTransition(StateMachineError::TerminalState { state, .. })) => debug!(
            task_check_run_id = check_run.id,
            task_id = task.id,
            stored = %state,
            "Task check run already finished, dropping this outcome"
        ),
        Err(e) => error!(
            task_check_run_id = check_run.id,
            task_id = task.id,
            check_type = %check_run.check_type,
            status = ?status,
            error = %e,
            "Failed to persist task check run outcome"
        ),
    }
}

fn log_join_error(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if !e.is_cancelled() {
            error!(error = %e, "Task check worker terminated abnormally");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
