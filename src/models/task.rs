//! # Task Model
//!
//! One unit of capability-specific work against one document. The `key`
//! names both the capability and the worker queue the dispatch message is
//! published to. The `state` lives in an HTTP-status-like code space so
//! worker-reported outcomes (4xx/5xx) are stored verbatim.
//!
//! ## Concurrency
//!
//! Tasks carry a `version` column. Every state mutation goes through
//! [`Task::update_state`], which only writes when the caller's expected
//! version still matches; a miss means another writer raced and the caller
//! must re-read and retry the transition. This conditional update is the
//! sole serialization point between request handling and the response
//! consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::constants::priority;

/// Inbound assignment payload. `id` is present only to detect and reject
/// caller-supplied identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// One capability-keyed work unit parented to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub task_id: Uuid,
    pub document_id: Uuid,
    pub key: String,
    pub state: i32,
    pub msg: String,
    pub priority: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New task for creation (identifier and version assigned by the store)
#[derive(Debug, Clone)]
pub struct NewTask {
    pub document_id: Uuid,
    pub key: String,
    pub state: i32,
    pub msg: String,
    pub priority: i32,
}

/// Filter for task searches: "state not in {set}" and "key equals"
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub states_not_in: Vec<i32>,
    pub key: Option<String>,
}

const TASK_COLUMNS: &str =
    "task_id, document_id, key, state, msg, priority, version, created_at, updated_at";

impl Task {
    /// Persist a new task with a store-assigned id and version 1
    pub async fn create(pool: &PgPool, new_task: NewTask) -> Result<Task, sqlx::Error> {
        let sql = format!(
            "INSERT INTO mediatask_tasks \
             (task_id, document_id, key, state, msg, priority, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 1, NOW(), NOW()) \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_task.document_id)
            .bind(&new_task.key)
            .bind(new_task.state)
            .bind(&new_task.msg)
            .bind(new_task.priority)
            .fetch_one(pool)
            .await
    }

    /// Find a task by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM mediatask_tasks WHERE task_id = $1");

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All tasks parented to a document
    pub async fn list_by_document(
        pool: &PgPool,
        document_id: Uuid,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM mediatask_tasks \
             WHERE document_id = $1 ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(document_id)
            .fetch_all(pool)
            .await
    }

    /// Tasks whose state is outside the terminal-success set
    pub async fn list_unfinished(
        pool: &PgPool,
        success_code: i32,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM mediatask_tasks \
             WHERE state <> $1 ORDER BY priority DESC, created_at ASC"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(success_code)
            .fetch_all(pool)
            .await
    }

    /// Search tasks by filter ("state not in {set}", "key equals")
    pub async fn search(pool: &PgPool, filter: &TaskFilter) -> Result<Vec<Task>, sqlx::Error> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM mediatask_tasks \
             WHERE (cardinality($1::int4[]) = 0 OR NOT (state = ANY($1))) \
               AND ($2::text IS NULL OR key = $2) \
             ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(&filter.states_not_in)
            .bind(filter.key.as_deref())
            .fetch_all(pool)
            .await
    }

    /// Delete a task and its dependent results.
    /// Returns false when the id was unknown.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM mediatask_tasks WHERE task_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditional state update: writes only when `expected_version` still
    /// matches, bumping the version. Returns the refreshed task, or `None`
    /// when no row matched (stale version or unknown id; the caller
    /// distinguishes the two by re-reading).
    pub async fn update_state(
        pool: &PgPool,
        id: Uuid,
        expected_version: i64,
        new_state: i32,
        new_msg: &str,
    ) -> Result<Option<Task>, sqlx::Error> {
        let sql = format!(
            "UPDATE mediatask_tasks \
             SET state = $3, msg = $4, version = version + 1, updated_at = NOW() \
             WHERE task_id = $1 AND version = $2 \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(expected_version)
            .bind(new_state)
            .bind(new_msg)
            .fetch_optional(pool)
            .await
    }
}

impl TaskSpec {
    /// Effective priority: the default when unset. Out-of-bounds values
    /// are the orchestrator's job to reject, not clamp.
    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(priority::DEFAULT)
    }
}
