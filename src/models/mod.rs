//! # Data Model Layer
//!
//! Persisted record kinds for the orchestration core: documents (registered
//! media assets), tasks (capability-keyed work units), and results (worker
//! output). Each model carries its own SQL over a shared `PgPool`, with
//! store-assigned UUID identifiers and a parent→child hierarchy
//! (document → task → result).

pub mod document;
pub mod result;
pub mod task;

pub use document::{Creator, Document, DocumentSpec, NewDocument, Target};
pub use result::{Generator, NewWorkerResult, WorkerResult};
pub use task::{NewTask, Task, TaskFilter, TaskSpec};
