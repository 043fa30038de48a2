//! # Queue Message Types
//!
//! The two message shapes crossing the broker boundary. `DispatchMessage`
//! carries enough context (document id, priority) that a worker can begin
//! without an extra store round-trip. `WorkerResponse` mirrors what worker
//! implementations publish: the task id, a verbatim status code, a human
//! readable message, and optionally the produced payload plus the
//! generator identity of the software that made it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Generator;

/// Work order published to a capability-named queue on assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub task_id: Uuid,
    pub document_id: Uuid,
    pub key: String,
    pub priority: i32,
    pub metadata: DispatchMetadata,
}

/// Metadata for dispatch messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMetadata {
    pub dispatched_at: DateTime<Utc>,
}

impl DispatchMessage {
    /// Build the dispatch for a task; the queue it goes to is `key`.
    pub fn for_task(task: &crate::models::Task) -> Self {
        Self {
            task_id: task.task_id,
            document_id: task.document_id,
            key: task.key.clone(),
            priority: task.priority,
            metadata: DispatchMetadata {
                dispatched_at: Utc::now(),
            },
        }
    }
}

/// Completion message a worker publishes to the shared response queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub task_id: Uuid,
    /// Status code reported verbatim (200 success, 4xx rejected, 5xx failed)
    pub state: i32,
    #[serde(default)]
    pub msg: String,
    /// Identity of the worker software, present on success reports
    #[serde(default)]
    pub generator: Option<Generator>,
    /// Generator-defined output, present on success reports
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}
