//! # Mediatask Core
//!
//! Task orchestration core for media processing pipelines. Clients register
//! media-asset **documents**, attach **tasks** naming a capability a worker
//! pool must perform, and the core dispatches each task to the matching
//! worker queue, tracks its lifecycle state, and records the **results**
//! workers report back.
//!
//! ## Architecture
//!
//! Dispatch is synchronous and caller-driven; completion is asynchronous
//! and worker-driven, decoupled by the broker:
//!
//! ```text
//! caller → Orchestrator → StoreAdapter (persist) + QueueClient (publish)
//!                                         ↑
//! worker queue → worker → response queue → ResponseListener
//! ```
//!
//! The store is Postgres (sqlx); the broker is Postgres message queues
//! (pgmq). Tasks carry a version column and every state mutation is a
//! bounded read-modify-write through a conditional update, so a racing
//! administrative retry and worker completion never silently lose a write.
//!
//! ## Module Organization
//!
//! - [`models`] - documents, tasks, results with their SQL
//! - [`store`] - store adapter, the sole writer of persisted records
//! - [`state_machine`] - pure task state transition rules
//! - [`messaging`] - wire messages and the pgmq queue client
//! - [`orchestration`] - the orchestrator facade and response consumer
//! - [`config`] - typed configuration loading
//! - [`error`] - structured error taxonomy
//! - [`logging`] - environment-aware structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediatask_core::config::CoreConfig;
//! use mediatask_core::messaging::QueueClient;
//! use mediatask_core::orchestration::{Orchestrator, ResponseListener};
//! use mediatask_core::store::StoreAdapter;
//!
//! # async fn example() -> mediatask_core::Result<()> {
//! let config = CoreConfig::load()?;
//!
//! let store = StoreAdapter::connect(&config.database).await?;
//! store.ensure_schema().await?;
//! let queue = QueueClient::with_pool(store.pool().clone()).await;
//!
//! let orchestrator = Orchestrator::new(store, queue, config);
//! let listener = ResponseListener::new(orchestrator.clone()).start().await?;
//!
//! // ... serve requests through `orchestrator` ...
//!
//! listener.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use config::CoreConfig;
pub use error::{OrchestratorError, RecordKind, Result};
pub use messaging::{DispatchMessage, QueueClient, QueueStats, WorkerResponse};
pub use models::{Document, DocumentSpec, Generator, Task, TaskFilter, TaskSpec, WorkerResult};
pub use orchestration::{
    BatchAssignment, ListenerHandle, Orchestrator, ReadinessReport, ResponseListener,
};
pub use state_machine::TaskState;
pub use store::StoreAdapter;
