//! # Task Checks
//!
//! Automated validations attached to tasks before rollout.
//!
//! - [`composer`] decides which checks a task needs and queues them
//! - [`scheduler`] polls queued checks and dispatches them onto workers
//! - [`state`] holds the in-flight set and per-instance admission counters
//! - [`registry`] maps each check type to its [`TaskCheckExecutor`]
//! - [`executors`] provides the executors that need nothing beyond a driver

pub mod composer;
pub mod executor;
pub mod executors;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use composer::{Feature, LicenseService, StaticLicenseService, TaskCheckComposer};
pub use executor::TaskCheckExecutor;
pub use executors::{DatabaseConnectExecutor, GhostSyncExecutor, InstanceMigrationSchemaExecutor};
pub use registry::{ExecutorRegistry, ExecutorRegistryBuilder, RegistryError};
pub use scheduler::{TaskCheckScheduler, TickSummary};
pub use state::{AdmissionDenied, CheckRunPermit, SchedulerState};
