//! # Orchestration Layer
//!
//! The orchestrator facade that API callers drive (register, assign,
//! retry, reset, search, readiness) and the response consumer that drains
//! worker completion messages in the background. Both share the same store
//! adapter and queue client, constructed once at startup and passed
//! explicitly; the task version column is their only serialization point.

pub mod handler;
pub mod listener;
pub mod types;

pub use handler::Orchestrator;
pub use listener::{ListenerHandle, ResponseListener};
pub use types::{BatchAssignment, FailedAssignment, ReadinessReport};
