//! # System Constants
//!
//! Operational defaults and identifiers shared across the orchestration core.

/// Principal recorded as creator/updater for rows written by background runners
pub const SYSTEM_BOT_ID: i64 = 1;

/// Task check scheduler defaults
pub mod scheduler {
    /// Polling interval of the task check loop
    pub const DEFAULT_INTERVAL_MS: u64 = 1000;
    /// Outstanding check connections allowed per database instance
    pub const INSTANCE_MAXIMUM_CONNECTION_NUMBER: u32 = 5;
    /// Upper bound on concurrently running check workers
    pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 64;
}

/// gh-ost adapter defaults
pub mod ghost {
    /// Replica server ids handed to gh-ost start here; the task id is added on top
    pub const DEFAULT_SERVER_ID_OFFSET: u32 = 10_000_000;
    pub const DEFAULT_RUNTIME_DIR: &str = "/tmp";
    pub const DEFAULT_CHUNK_SIZE: i64 = 1000;
    pub const DEFAULT_MAX_LAG_MILLIS: i64 = 1500;
    pub const DEFAULT_DML_BATCH_SIZE: i64 = 10;
    pub const DEFAULT_CUT_OVER_LOCK_TIMEOUT_SECONDS: i64 = 3;
    pub const DEFAULT_HEARTBEAT_INTERVAL_MILLIS: i64 = 100;
    pub const DEFAULT_RETRIES: i64 = 60;
}

/// Migration history bookkeeping
pub mod migration {
    /// Prefix of every stored non-semantic version
    pub const NON_SEMANTIC_PREFIX: &str = "0000.0000.0000-";
    /// chrono format of the suffix appended to stored semantic versions
    pub const SEMANTIC_VERSION_SUFFIX_FORMAT: &str = "%Y%m%d%H%M%S";
    /// Upper bound (exclusive) of each MAJOR/MINOR/PATCH component
    pub const MAX_VERSION_COMPONENT: u64 = 10_000;
    /// Name of the history table created by the bookkeeping setup
    pub const HISTORY_TABLE: &str = "migration_history";
}
