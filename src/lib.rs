#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Schemaflow Core
//!
//! Orchestration core for database schema-change pipelines.
//!
//! ## Overview
//!
//! A change request becomes a **pipeline** of ordered **stages**, one per
//! environment. Each stage holds **tasks**, one unit of change against one
//! database, linked by DAG edges. Before a task rolls out, automated **task
//! checks** (connectivity, SQL review, syntax, gh-ost dry run...) run in the
//! background under per-instance admission control. Engines apply migrations
//! through a shared execution contract that keeps a crash-recoverable history.
//!
//! ## Module Organization
//!
//! - [`migration`] - Path template parsing, stored versions and the execution contract
//! - [`models`] - Pipelines, stages, tasks, check runs, history and catalog entries
//! - [`state_machine`] - Task and task run status machines
//! - [`orchestration`] - Batch pipeline creation, DAG merge and eligibility
//! - [`task_check`] - Check composition, executor registry and the polling scheduler
//! - [`driver`] - Database driver boundary and the engine-keyed registry
//! - [`ghost`] - gh-ost configuration for online schema changes
//! - [`store`] - Metadata store boundary and the in-memory store
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schemaflow_core::config::ConfigManager;
//! use schemaflow_core::store::InMemoryStore;
//! use schemaflow_core::task_check::{ExecutorRegistry, TaskCheckScheduler};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! schemaflow_core::logging::init_logging(&manager.config().logging);
//!
//! let store = Arc::new(InMemoryStore::new());
//! let registry = ExecutorRegistry::builder().build();
//! let scheduler = TaskCheckScheduler::new(store, registry, manager.config().scheduler.clone());
//! scheduler.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod ghost;
pub mod logging;
pub mod migration;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;
pub mod task_check;

pub use config::{ConfigManager, GhostSettings, LoggingConfig, SchedulerConfig, SchemaflowConfig};
pub use constants::SYSTEM_BOT_ID;
pub use driver::{Driver, DriverFactory, DriverRegistry};
pub use error::{ErrorCode, Result, SchemaflowError};
pub use migration::{execute_migration, parse_migration_info, parse_schema_file_info, MigrationExecutor};
pub use orchestration::{merge_task_create_lists, PipelineCreator};
pub use state_machine::{TaskRunStatus, TaskStatus};
pub use store::{InMemoryStore, Store};
pub use task_check::{TaskCheckComposer, TaskCheckScheduler};
