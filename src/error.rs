//! # Orchestrator Error Types
//!
//! Structured error taxonomy for the orchestration core using thiserror.
//! The transport layer owns the mapping from these kinds to HTTP status
//! codes; nothing in this crate encodes transport concerns.

use thiserror::Error;

/// Record kinds persisted by the store adapter, used to qualify lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Document,
    Task,
    Result,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Task => write!(f, "task"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// Error taxonomy for the orchestration core
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Malformed or id-bearing input on create
    #[error("Format error: {message}")]
    Format { message: String },

    /// Unknown id for an existing record kind
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// Bad argument, e.g. an unparseable id or out-of-bounds priority
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Lost a concurrent-update race and exhausted the local retry bound
    #[error("Version conflict on task {task_id} after {attempts} attempts")]
    VersionConflict { task_id: String, attempts: u32 },

    /// Store or broker unreachable
    #[error("Dependency unavailable: {dependency}: {message}")]
    DependencyUnavailable {
        dependency: &'static str,
        message: String,
    },

    /// Operation the backing service does not offer (e.g. queue metrics)
    #[error("Unsupported operation: {operation}: {message}")]
    Unsupported {
        operation: &'static str,
        message: String,
    },

    /// Store query failed for a reason other than unavailability
    #[error("Database error: {operation}: {message}")]
    Database { operation: String, message: String },

    /// Queue operation failed for a reason other than unavailability
    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    Queue {
        queue_name: String,
        operation: String,
        message: String,
    },

    /// Message (de)serialization failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl OrchestratorError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn version_conflict(task_id: impl Into<String>, attempts: u32) -> Self {
        Self::VersionConflict {
            task_id: task_id.into(),
            attempts,
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            dependency: "database",
            message: message.into(),
        }
    }

    pub fn broker_unavailable(message: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            dependency: "messagequeue",
            message: message.into(),
        }
    }

    pub fn unsupported(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            message: message.into(),
        }
    }

    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn queue(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Queue {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the Response Consumer should leave the triggering message
    /// unacknowledged for redelivery instead of discarding it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict { .. }
                | Self::DependencyUnavailable { .. }
                | Self::Database { .. }
                | Self::Queue { .. }
        )
    }
}

/// Conversion from sqlx::Error, distinguishing unavailability from query errors
impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::store_unavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) => Self::database("query", db_err.to_string()),
            other => Self::database("query", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<pgmq::errors::PgmqError> for OrchestratorError {
    fn from(err: pgmq::errors::PgmqError) -> Self {
        Self::broker_unavailable(err.to_string())
    }
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
