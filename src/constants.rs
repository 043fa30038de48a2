//! # System Constants
//!
//! Status codes, priority bounds, and operational defaults shared across
//! the orchestration core. Task states live in an HTTP-status-like code
//! space so worker-reported error codes (4xx/5xx) can be stored verbatim.

/// Task status codes
pub mod status {
    /// Task record created, dispatch not yet confirmed
    pub const TASK_CREATED: i32 = 201;
    /// Task queued, awaiting a worker
    pub const TASK_QUEUED: i32 = 102;
    /// Worker reported successful completion
    pub const TASK_SUCCESS: i32 = 200;
}

/// Task priority bounds (broker priority range)
pub mod priority {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 10;
    pub const DEFAULT: i32 = 5;
}

/// Operational defaults for the queue layer and state updates
pub mod defaults {
    /// Shared queue workers publish completion messages to
    pub const RESPONSE_QUEUE: &str = "worker_responses";
    /// Seconds a read message stays invisible before redelivery
    pub const VISIBILITY_TIMEOUT_SECONDS: i32 = 30;
    /// Seconds the response consumer sleeps when the queue is empty
    pub const POLL_INTERVAL_SECONDS: u64 = 1;
    /// Messages drained from the response queue per batch
    pub const RESPONSE_BATCH_SIZE: i32 = 10;
    /// Conditional-update attempts before a conflict surfaces
    pub const VERSION_CONFLICT_RETRIES: u32 = 3;
}
