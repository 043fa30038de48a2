//! # Core Configuration
//!
//! Typed configuration for the orchestration core, layered from built-in
//! defaults, an optional `mediatask.toml` file, and `MEDIATASK_*`
//! environment variables (e.g. `MEDIATASK_DATABASE__URL`). Explicit,
//! validated loading; no ambient globals.

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::{OrchestratorError, Result};

/// Root configuration for the orchestration core
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CoreConfig {
    /// Database connection and pooling
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Queue names and consumption tuning
    #[serde(default)]
    pub queue: QueueConfig,

    /// Bounded-retry behavior for conditional task updates
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL (also hosts the pgmq extension)
    pub url: String,
    /// Maximum pool connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/mediatask".to_string(),
            max_connections: 10,
        }
    }
}

/// Queue configuration for dispatch and response consumption
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Shared queue workers publish completion messages to
    pub response_queue: String,
    /// Seconds a read message stays invisible before redelivery
    pub visibility_timeout_seconds: i32,
    /// Seconds the response consumer sleeps when the queue is empty
    pub poll_interval_seconds: u64,
    /// Messages drained from the response queue per batch
    pub response_batch_size: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            response_queue: defaults::RESPONSE_QUEUE.to_string(),
            visibility_timeout_seconds: defaults::VISIBILITY_TIMEOUT_SECONDS,
            poll_interval_seconds: defaults::POLL_INTERVAL_SECONDS,
            response_batch_size: defaults::RESPONSE_BATCH_SIZE,
        }
    }
}

/// Bounded-retry configuration for optimistic concurrency conflicts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Conditional-update attempts before a conflict surfaces to the caller
    pub version_conflict_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            version_conflict_retries: defaults::VERSION_CONFLICT_RETRIES,
        }
    }
}

impl CoreConfig {
    /// Load configuration from `mediatask.toml` (optional) and
    /// `MEDIATASK_*` environment variables over built-in defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file path plus the environment.
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(p) => builder.add_source(config::File::with_name(p)),
            None => builder.add_source(config::File::with_name("mediatask").required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix("MEDIATASK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| OrchestratorError::validation(format!("configuration: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| OrchestratorError::validation(format!("configuration: {e}")))
    }
}
