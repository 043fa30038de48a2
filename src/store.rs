//! # Store Adapter
//!
//! Facade over the Postgres document store. The adapter is the sole writer
//! of persisted records; only the orchestrator and the response consumer
//! call its mutating operations. It owns schema bootstrap and the health
//! probe used by readiness checks.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    Document, NewDocument, NewTask, NewWorkerResult, Task, TaskFilter, WorkerResult,
};

const SCHEMA_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS mediatask_documents (
        document_id UUID PRIMARY KEY,
        target_id TEXT NOT NULL,
        target_url TEXT NOT NULL,
        target_type TEXT NOT NULL,
        creator_id TEXT NOT NULL,
        creator_type TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS mediatask_tasks (
        task_id UUID PRIMARY KEY,
        document_id UUID NOT NULL REFERENCES mediatask_documents(document_id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        state INTEGER NOT NULL,
        msg TEXT NOT NULL DEFAULT '',
        priority INTEGER NOT NULL,
        version BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS mediatask_results (
        result_id UUID PRIMARY KEY,
        task_id UUID NOT NULL REFERENCES mediatask_tasks(task_id) ON DELETE CASCADE,
        generator_id TEXT NOT NULL,
        generator_name TEXT NOT NULL,
        generator_homepage TEXT NOT NULL,
        generator_type TEXT NOT NULL,
        payload JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_mediatask_tasks_document ON mediatask_tasks (document_id)",
    "CREATE INDEX IF NOT EXISTS idx_mediatask_tasks_state ON mediatask_tasks (state)",
    "CREATE INDEX IF NOT EXISTS idx_mediatask_results_task ON mediatask_results (task_id)",
    "CREATE INDEX IF NOT EXISTS idx_mediatask_documents_target ON mediatask_documents (target_id)",
];

/// Store adapter over a pooled Postgres connection
#[derive(Debug, Clone)]
pub struct StoreAdapter {
    pool: PgPool,
}

impl StoreAdapter {
    /// Connect a new pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(max_connections = config.max_connections, "🗄️ Connecting document store");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (shared with the queue client)
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap. Serialized through an advisory lock so
    /// concurrent starters do not race the DDL.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(730221101)")
            .execute(&mut *tx)
            .await?;
        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!("✅ Document store schema ready");
        Ok(())
    }

    /// Health probe used by readiness checks
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Underlying pool, shared with the queue client
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- documents ---

    pub async fn create_document(&self, new_document: NewDocument) -> Result<Document> {
        let document = Document::create(&self.pool, new_document).await?;
        debug!(document_id = %document.document_id, "💾 Document persisted");
        Ok(document)
    }

    pub async fn document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(Document::find_by_id(&self.pool, id).await?)
    }

    /// Delete a document and, atomically with it, its tasks and results.
    pub async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let deleted = Document::delete(&self.pool, id).await?;
        if deleted {
            debug!(document_id = %id, "🗑️ Document deleted with children");
        }
        Ok(deleted)
    }

    pub async fn search_documents(
        &self,
        target_id_pattern: &str,
        creator_id_pattern: &str,
    ) -> Result<Vec<Document>> {
        Ok(Document::search(&self.pool, target_id_pattern, creator_id_pattern).await?)
    }

    // --- tasks ---

    pub async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let task = Task::create(&self.pool, new_task).await?;
        debug!(task_id = %task.task_id, key = %task.key, "💾 Task persisted");
        Ok(task)
    }

    pub async fn task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    pub async fn tasks_for_document(&self, document_id: Uuid) -> Result<Vec<Task>> {
        Ok(Task::list_by_document(&self.pool, document_id).await?)
    }

    pub async fn unfinished_tasks(&self, success_code: i32) -> Result<Vec<Task>> {
        Ok(Task::list_unfinished(&self.pool, success_code).await?)
    }

    pub async fn search_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        Ok(Task::search(&self.pool, filter).await?)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    /// Conditional task-state update, the sole concurrency-safety
    /// primitive. `None` means no row matched the id + expected version.
    pub async fn update_task_state(
        &self,
        id: Uuid,
        expected_version: i64,
        new_state: i32,
        new_msg: &str,
    ) -> Result<Option<Task>> {
        Ok(Task::update_state(&self.pool, id, expected_version, new_state, new_msg).await?)
    }

    // --- results ---

    pub async fn create_result(&self, new_result: NewWorkerResult) -> Result<WorkerResult> {
        let result = WorkerResult::create(&self.pool, new_result).await?;
        debug!(result_id = %result.result_id, task_id = %result.task_id, "💾 Result persisted");
        Ok(result)
    }

    pub async fn result(&self, id: Uuid) -> Result<Option<WorkerResult>> {
        Ok(WorkerResult::find_by_id(&self.pool, id).await?)
    }

    pub async fn results_for_task(&self, task_id: Uuid) -> Result<Vec<WorkerResult>> {
        Ok(WorkerResult::list_by_task(&self.pool, task_id).await?)
    }

    pub async fn delete_result(&self, id: Uuid) -> Result<bool> {
        Ok(WorkerResult::delete(&self.pool, id).await?)
    }
}
