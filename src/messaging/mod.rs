//! # Messaging Layer
//!
//! Wire messages and the queue client for the dispatch/acknowledgement
//! protocol. Dispatch messages go to the queue named by the task's `key`;
//! workers publish completion messages to one shared response queue that
//! only the response consumer drains.

pub mod message;
pub mod pgmq_client;

pub use message::{DispatchMessage, DispatchMetadata, WorkerResponse};
pub use pgmq_client::{QueueClient, QueueStats};
