//! # Task State Machine
//!
//! Pure transition logic, no I/O. States live in an HTTP-status-like code
//! space: a small in-flight set (created, queued), one terminal-success
//! code, and an open set of worker-reported error codes (4xx rejected
//! work, 5xx worker failure) stored verbatim.
//!
//! Persistence of a computed transition happens elsewhere through the
//! store adapter's conditional update; this module only decides what the
//! legal target state is.

pub mod states;

pub use states::TaskState;

use thiserror::Error;

/// A transition the current state does not permit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid transition from {from}: {reason}")]
pub struct InvalidTransition {
    pub from: TaskState,
    pub reason: String,
}

/// State a freshly assigned task starts in
pub fn initial_state() -> TaskState {
    TaskState::Created
}

/// Human-readable detail accompanying the initial state
pub const CREATED_MSG: &str = "Created";

/// Human-readable detail once the dispatch message is on the queue
pub const QUEUED_MSG: &str = "Task queued";

/// Target state for a retry. Rejected while the task is in flight unless
/// `force` overrides the guard (administrative recovery of stuck tasks).
/// A successful retry clears `msg` and re-dispatches.
pub fn retry_target(current: TaskState, force: bool) -> Result<TaskState, InvalidTransition> {
    if current.is_in_flight() && !force {
        return Err(InvalidTransition {
            from: current,
            reason: "task is in flight; use force to override".to_string(),
        });
    }
    Ok(TaskState::Queued)
}

/// Target state for a reset: unconditionally back to queued, regardless of
/// the current state (recovers dispatches whose worker died silently).
pub fn reset_target(_current: TaskState) -> TaskState {
    TaskState::Queued
}

/// The worker's completion report is authoritative for the task it names;
/// the reported code overwrites whatever state the task is in.
pub fn worker_report_target(reported_code: i32) -> TaskState {
    TaskState::from_code(reported_code)
}
