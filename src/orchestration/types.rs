//! Shared orchestration result types.

use serde::Serialize;

use crate::models::Task;

/// Outcome of a batch assignment: per-document successes and failures.
/// Partial failure never fails the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchAssignment {
    pub success: Vec<Task>,
    pub failed: Vec<FailedAssignment>,
}

/// One document id the batch could not assign to, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct FailedAssignment {
    pub document_id: String,
    pub reason: String,
}

/// Per-dependency readiness probe outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub database: bool,
    pub messagequeue: bool,
    /// Logical AND of the dependency probes
    pub ready: bool,
}

impl ReadinessReport {
    pub fn new(database: bool, messagequeue: bool) -> Self {
        Self {
            database,
            messagequeue,
            ready: database && messagequeue,
        }
    }
}
