use std::fmt;

use crate::constants::status;

/// Task state in the HTTP-status-like code space.
///
/// Known lifecycle codes get their own variants; every other code is a
/// worker-reported outcome carried verbatim (the code set is open on the
/// error side by design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Task record created, dispatch not yet confirmed (201)
    Created,
    /// Queued, awaiting a worker (102)
    Queued,
    /// Worker reported successful completion (200)
    Success,
    /// Any other worker-reported code, stored verbatim
    WorkerReported(i32),
}

impl TaskState {
    /// Map a stored or reported status code to a state
    pub fn from_code(code: i32) -> Self {
        match code {
            status::TASK_CREATED => Self::Created,
            status::TASK_QUEUED => Self::Queued,
            status::TASK_SUCCESS => Self::Success,
            other => Self::WorkerReported(other),
        }
    }

    /// The status code persisted for this state
    pub fn code(&self) -> i32 {
        match self {
            Self::Created => status::TASK_CREATED,
            Self::Queued => status::TASK_QUEUED,
            Self::Success => status::TASK_SUCCESS,
            Self::WorkerReported(code) => *code,
        }
    }

    /// Queued or awaiting worker completion
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Created | Self::Queued)
    }

    /// Terminal-success: excluded from the unfinished-task listing
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "201 Created"),
            Self::Queued => write!(f, "102 Queued"),
            Self::Success => write!(f, "200 Success"),
            Self::WorkerReported(code) => write!(f, "{code} WorkerReported"),
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Created
    }
}
