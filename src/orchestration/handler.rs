//! # Orchestrator
//!
//! The facade API callers drive. Holds owned references to the store
//! adapter and queue client (dependency injection, no ambient globals) and
//! implements the orchestration contract: document registration, task
//! assignment and dispatch, retry/reset recovery, lookups and search,
//! unfinished-task listing, worker backlog introspection, and readiness.
//!
//! ## Dispatch atomicity
//!
//! Assignment persists the task first and publishes second; a publish
//! failure rolls the record back, so a failed assignment is never
//! observable as "assigned". Retry and reset claim the task through the
//! version-checked update *before* republishing, which keeps at most one
//! outstanding dispatch per task even under concurrent administrative
//! calls.

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::constants::priority;
use crate::error::{OrchestratorError, RecordKind, Result};
use crate::messaging::{DispatchMessage, QueueClient, QueueStats, WorkerResponse};
use crate::models::{
    Document, DocumentSpec, Generator, NewTask, NewWorkerResult, Task, TaskSpec, WorkerResult,
};
use crate::state_machine::{self, TaskState};
use crate::store::StoreAdapter;

use super::types::{BatchAssignment, FailedAssignment, ReadinessReport};

/// How a redispatch was requested
#[derive(Debug, Clone, Copy)]
enum Redispatch {
    /// Guarded by the in-flight check unless forced
    Retry { force: bool },
    /// Unconditional recovery
    Reset,
}

/// Orchestration facade over the store adapter and queue client
#[derive(Debug, Clone)]
pub struct Orchestrator {
    store: StoreAdapter,
    queue: QueueClient,
    config: CoreConfig,
}

impl Orchestrator {
    pub fn new(store: StoreAdapter, queue: QueueClient, config: CoreConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    pub fn queue_client(&self) -> &QueueClient {
        &self.queue
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // --- documents ---

    /// Validate and persist a new document, returning it with its
    /// store-assigned id.
    pub async fn register_document(&self, spec: DocumentSpec) -> Result<Document> {
        validate_document_spec(&spec)?;

        let document = self.store.create_document(spec.into()).await?;
        info!(document_id = %document.document_id, target_id = %document.target_id, "📄 Document registered");
        Ok(document)
    }

    pub async fn document(&self, id: &str) -> Result<Document> {
        let document_id = parse_id(id)?;
        self.store
            .document(document_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(RecordKind::Document, id))
    }

    /// Delete a document and its child tasks/results atomically
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let document_id = parse_id(id)?;
        if self.store.delete_document(document_id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::not_found(RecordKind::Document, id))
        }
    }

    /// Best-effort batch deletion: each id is handled independently and
    /// missing or malformed ids are tolerated silently (idempotent delete).
    pub async fn delete_documents(&self, ids: &[String]) {
        for id in ids {
            if let Err(e) = self.delete_document(id).await {
                tracing::debug!(document_id = %id, error = %e, "Batch delete skipped document");
            }
        }
    }

    /// Documents matching both patterns; the `"*"` sentinel matches any
    pub async fn search(
        &self,
        target_id_pattern: &str,
        creator_id_pattern: &str,
    ) -> Result<Vec<Document>> {
        self.store
            .search_documents(target_id_pattern, creator_id_pattern)
            .await
    }

    // --- tasks ---

    /// Assign a task against one document: persist in the initial state,
    /// publish the dispatch, then mark queued. Rolls the record back when
    /// the publish fails.
    pub async fn assign_task(&self, spec: &TaskSpec, document_id: &str) -> Result<Task> {
        validate_task_spec(spec)?;

        let doc_id = parse_id(document_id)?;
        if self.store.document(doc_id).await?.is_none() {
            return Err(OrchestratorError::not_found(RecordKind::Document, document_id));
        }

        let task = self
            .store
            .create_task(NewTask {
                document_id: doc_id,
                key: spec.key.clone(),
                state: state_machine::initial_state().code(),
                msg: state_machine::CREATED_MSG.to_string(),
                priority: spec.effective_priority(),
            })
            .await?;

        let dispatch = DispatchMessage::for_task(&task);
        if let Err(publish_err) = self.queue.publish_dispatch(&dispatch).await {
            // Roll back so the failed assignment is never observable
            if let Err(delete_err) = self.store.delete_task(task.task_id).await {
                warn!(
                    task_id = %task.task_id,
                    error = %delete_err,
                    "Failed to roll back task after publish failure"
                );
            }
            return Err(publish_err);
        }

        info!(task_id = %task.task_id, key = %task.key, "🚀 Task assigned and dispatched");

        // Confirm the dispatch on the record. A worker that already
        // reported in between wins the version check; keep its state.
        match self
            .store
            .update_task_state(
                task.task_id,
                task.version,
                TaskState::Queued.code(),
                state_machine::QUEUED_MSG,
            )
            .await?
        {
            Some(updated) => Ok(updated),
            None => self.store.task(task.task_id).await?.ok_or_else(|| {
                OrchestratorError::not_found(RecordKind::Task, task.task_id.to_string())
            }),
        }
    }

    /// Assign the same task spec against many documents. Each document is
    /// processed independently; the batch never fails for one bad id.
    pub async fn assign_tasks(&self, spec: &TaskSpec, document_ids: &[String]) -> BatchAssignment {
        let mut outcome = BatchAssignment::default();

        for document_id in document_ids {
            match self.assign_task(spec, document_id).await {
                Ok(task) => outcome.success.push(task),
                Err(e) => outcome.failed.push(FailedAssignment {
                    document_id: document_id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        outcome
    }

    pub async fn task(&self, id: &str) -> Result<Task> {
        let task_id = parse_id(id)?;
        self.store
            .task(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(RecordKind::Task, id))
    }

    /// All tasks parented to a document
    pub async fn tasks_for_document(&self, document_id: &str) -> Result<Vec<Task>> {
        let doc_id = parse_id(document_id)?;
        if self.store.document(doc_id).await?.is_none() {
            return Err(OrchestratorError::not_found(RecordKind::Document, document_id));
        }
        self.store.tasks_for_document(doc_id).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let task_id = parse_id(id)?;
        if self.store.delete_task(task_id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::not_found(RecordKind::Task, id))
        }
    }

    /// Retry a settled task: rejected while in flight unless `force`.
    /// Resets to queued, clears `msg`, republishes the dispatch.
    pub async fn retry_task(&self, id: &str, force: bool) -> Result<Task> {
        self.redispatch(id, Redispatch::Retry { force }).await
    }

    /// Reset a task regardless of its current state and republish
    pub async fn reset_task(&self, id: &str) -> Result<Task> {
        self.redispatch(id, Redispatch::Reset).await
    }

    /// Tasks whose state is outside the terminal-success set
    pub async fn unfinished_tasks(&self) -> Result<Vec<Task>> {
        self.store.unfinished_tasks(TaskState::Success.code()).await
    }

    // --- results ---

    pub async fn result(&self, id: &str) -> Result<WorkerResult> {
        let result_id = parse_id(id)?;
        self.store
            .result(result_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(RecordKind::Result, id))
    }

    pub async fn results_for_task(&self, task_id: &str) -> Result<Vec<WorkerResult>> {
        let id = parse_id(task_id)?;
        self.store.results_for_task(id).await
    }

    pub async fn delete_result(&self, id: &str) -> Result<()> {
        let result_id = parse_id(id)?;
        if self.store.delete_result(result_id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::not_found(RecordKind::Result, id))
        }
    }

    // --- worker completion (response consumer only) ---

    /// Apply a worker's completion report. The report is authoritative:
    /// state and msg are overwritten with whatever the worker sent, but
    /// the write still goes through the version check so a racing retry is
    /// detected and retried against the fresh version, never lost.
    pub async fn on_worker_result(&self, response: &WorkerResponse) -> Result<Task> {
        let id = response.task_id;
        let retries = self.config.retry.version_conflict_retries;

        let mut task = self
            .store
            .task(id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(RecordKind::Task, id.to_string()))?;

        let mut updated = None;
        for _attempt in 0..retries {
            match self
                .store
                .update_task_state(id, task.version, response.state, &response.msg)
                .await?
            {
                Some(t) => {
                    updated = Some(t);
                    break;
                }
                None => {
                    task = self.store.task(id).await?.ok_or_else(|| {
                        OrchestratorError::not_found(RecordKind::Task, id.to_string())
                    })?;
                }
            }
        }

        let task = updated.ok_or_else(|| {
            OrchestratorError::version_conflict(id.to_string(), retries)
        })?;

        info!(
            task_id = %id,
            state = response.state,
            "📨 Worker result applied"
        );

        if state_machine::worker_report_target(response.state).is_success() {
            if let Some(payload) = &response.payload {
                let generator = response.generator.clone().unwrap_or_else(unknown_generator);
                let result = self
                    .store
                    .create_result(NewWorkerResult {
                        task_id: id,
                        generator,
                        payload: payload.clone(),
                    })
                    .await?;
                info!(task_id = %id, result_id = %result.result_id, "🎯 Result recorded");
            }
        }

        Ok(task)
    }

    // --- monitoring ---

    /// Best-effort per-queue backlog counts
    pub async fn worker_status(&self) -> Result<Vec<QueueStats>> {
        self.queue.queue_stats().await
    }

    /// Probe both dependencies independently; never errors
    pub async fn readiness(&self) -> ReadinessReport {
        let database = self.store.ping().await;
        let messagequeue = self.queue.is_connected().await;
        ReadinessReport::new(database, messagequeue)
    }

    // --- internals ---

    /// Bounded claim-then-republish shared by retry and reset. The
    /// version-checked claim is the serialization point: losing it means
    /// another writer raced, so the guard is re-evaluated against the
    /// fresh state before the next attempt.
    async fn redispatch(&self, id: &str, mode: Redispatch) -> Result<Task> {
        let task_id = parse_id(id)?;
        let retries = self.config.retry.version_conflict_retries;

        let mut task = self
            .store
            .task(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(RecordKind::Task, id))?;

        for _attempt in 0..retries {
            let current = TaskState::from_code(task.state);
            let target = match mode {
                Redispatch::Retry { force } => state_machine::retry_target(current, force)
                    .map_err(|e| OrchestratorError::validation(e.to_string()))?,
                Redispatch::Reset => state_machine::reset_target(current),
            };

            let prev_state = task.state;
            let prev_msg = task.msg.clone();

            match self
                .store
                .update_task_state(task_id, task.version, target.code(), "")
                .await?
            {
                Some(claimed) => {
                    let dispatch = DispatchMessage::for_task(&claimed);
                    if let Err(publish_err) = self.queue.publish_dispatch(&dispatch).await {
                        // Best-effort revert of the claim; if this races
                        // another writer the newer write stands.
                        if let Err(revert_err) = self
                            .store
                            .update_task_state(task_id, claimed.version, prev_state, &prev_msg)
                            .await
                        {
                            warn!(
                                task_id = %task_id,
                                error = %revert_err,
                                "Failed to revert claim after publish failure"
                            );
                        }
                        return Err(publish_err);
                    }

                    info!(task_id = %task_id, mode = ?mode, "🔁 Task redispatched");
                    return Ok(claimed);
                }
                None => {
                    task = self
                        .store
                        .task(task_id)
                        .await?
                        .ok_or_else(|| OrchestratorError::not_found(RecordKind::Task, id))?;
                }
            }
        }

        Err(OrchestratorError::version_conflict(id, retries))
    }
}

/// Parse an opaque id; malformed ids are validation errors, distinct from
/// unknown-id NotFound.
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| OrchestratorError::validation(format!("unparseable id: {raw}")))
}

fn validate_document_spec(spec: &DocumentSpec) -> Result<()> {
    if spec.id.is_some() {
        return Err(OrchestratorError::format(
            "document must not carry an id on creation",
        ));
    }
    if spec.target.id.is_empty() || spec.target.url.is_empty() {
        return Err(OrchestratorError::format("document target is incomplete"));
    }
    if spec.creator.id.is_empty() {
        return Err(OrchestratorError::format("document creator is incomplete"));
    }
    Ok(())
}

fn validate_task_spec(spec: &TaskSpec) -> Result<()> {
    if spec.id.is_some() {
        return Err(OrchestratorError::format(
            "task must not carry an id on creation",
        ));
    }
    if spec.key.is_empty() {
        return Err(OrchestratorError::validation("task key is required"));
    }
    if let Some(p) = spec.priority {
        if !(priority::MIN..=priority::MAX).contains(&p) {
            return Err(OrchestratorError::validation(format!(
                "priority {p} outside {}..={}",
                priority::MIN,
                priority::MAX
            )));
        }
    }
    Ok(())
}

/// Placeholder identity for workers that report success without naming
/// their generator.
fn unknown_generator() -> Generator {
    Generator {
        id: "unknown".to_string(),
        name: "unknown".to_string(),
        homepage: String::new(),
        kind: "Software".to_string(),
    }
}
