//! # Result Model
//!
//! The payload a worker produced for one task, recorded only when a worker
//! reports success. The payload shape is generator-defined, so it is stored
//! as schema-free JSON. Results are never mutated in place; a retried task
//! simply grows another result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Identifies the worker software that produced a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    pub id: String,
    pub name: String,
    pub homepage: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Worker output for one completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkerResult {
    pub result_id: Uuid,
    pub task_id: Uuid,
    pub generator_id: String,
    pub generator_name: String,
    pub generator_homepage: String,
    pub generator_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// New result for creation (identifier assigned by the store)
#[derive(Debug, Clone)]
pub struct NewWorkerResult {
    pub task_id: Uuid,
    pub generator: Generator,
    pub payload: serde_json::Value,
}

const RESULT_COLUMNS: &str = "result_id, task_id, generator_id, generator_name, \
     generator_homepage, generator_type, payload, created_at";

impl WorkerResult {
    /// Persist a new result with a store-assigned id
    pub async fn create(
        pool: &PgPool,
        new_result: NewWorkerResult,
    ) -> Result<WorkerResult, sqlx::Error> {
        let sql = format!(
            "INSERT INTO mediatask_results \
             (result_id, task_id, generator_id, generator_name, generator_homepage, generator_type, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
             RETURNING {RESULT_COLUMNS}"
        );

        sqlx::query_as::<_, WorkerResult>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_result.task_id)
            .bind(&new_result.generator.id)
            .bind(&new_result.generator.name)
            .bind(&new_result.generator.homepage)
            .bind(&new_result.generator.kind)
            .bind(&new_result.payload)
            .fetch_one(pool)
            .await
    }

    /// Find a result by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<WorkerResult>, sqlx::Error> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM mediatask_results WHERE result_id = $1");

        sqlx::query_as::<_, WorkerResult>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All results parented to a task
    pub async fn list_by_task(
        pool: &PgPool,
        task_id: Uuid,
    ) -> Result<Vec<WorkerResult>, sqlx::Error> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM mediatask_results \
             WHERE task_id = $1 ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, WorkerResult>(&sql)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// Delete a result. Returns false when the id was unknown.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM mediatask_results WHERE result_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
