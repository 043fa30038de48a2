//! # Queue Client (pgmq)
//!
//! Broker wrapper over Postgres message queues (pgmq-rs). One queue per
//! capability `key`, one shared response queue. Visibility timeouts give
//! at-least-once redelivery of unacknowledged messages; `ack` deletes a
//! handled message and `park` archives one that can never be delivered.

use pgmq::{types::Message, PGMQueue};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::messaging::DispatchMessage;

/// Per-queue backlog snapshot from the broker's management interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue_name: String,
    /// Messages waiting to be consumed
    pub pending_messages: i64,
    /// Active consumers; `None` when the broker does not track consumers
    /// (pgmq reports backlog only)
    pub consumers: Option<i64>,
}

/// Message queue client over pgmq
#[derive(Debug, Clone)]
pub struct QueueClient {
    pgmq: PGMQueue,
}

impl QueueClient {
    /// Connect a new client from a connection string
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("📡 Connecting message queue client");

        let pgmq = PGMQueue::new(database_url.to_string()).await?;

        info!("✅ Message queue client connected");
        Ok(Self { pgmq })
    }

    /// Create a client over an existing connection pool (shared with the store)
    pub async fn with_pool(pool: PgPool) -> Self {
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq }
    }

    /// Create a queue if it does not exist
    pub async fn ensure_queue(&self, queue_name: &str) -> Result<()> {
        self.pgmq.create(queue_name).await.map_err(|e| {
            OrchestratorError::queue(queue_name, "create", e.to_string())
        })?;

        debug!(queue = queue_name, "📋 Queue ensured");
        Ok(())
    }

    /// Publish a dispatch message to the queue named by the task's key
    pub async fn publish_dispatch(&self, message: &DispatchMessage) -> Result<i64> {
        let queue_name = message.key.as_str();
        // Unroutable keys are accepted: the message sits queued until a
        // matching worker appears, and queue stats surface the backlog.
        self.ensure_queue(queue_name).await?;

        let message_id = self
            .pgmq
            .send(queue_name, message)
            .await
            .map_err(|e| OrchestratorError::queue(queue_name, "publish", e.to_string()))?;

        info!(
            queue = queue_name,
            task_id = %message.task_id,
            msg_id = message_id,
            "📤 Dispatch published"
        );
        Ok(message_id)
    }

    /// Publish an arbitrary JSON message (used by tests to simulate workers)
    pub async fn publish_json<T: Serialize + Sync>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<i64> {
        self.ensure_queue(queue_name).await?;

        let serialized = serde_json::to_value(message)?;
        let message_id = self
            .pgmq
            .send(queue_name, &serialized)
            .await
            .map_err(|e| OrchestratorError::queue(queue_name, "publish", e.to_string()))?;

        Ok(message_id)
    }

    /// Batch-read from a queue. Read messages stay invisible for
    /// `visibility_timeout` seconds and are redelivered unless acknowledged.
    pub async fn read_batch(
        &self,
        queue_name: &str,
        visibility_timeout: Option<i32>,
        limit: i32,
    ) -> Result<Vec<Message<serde_json::Value>>> {
        let messages = self
            .pgmq
            .read_batch(queue_name, visibility_timeout, limit)
            .await
            .map_err(|e| OrchestratorError::queue(queue_name, "read", e.to_string()))?
            .unwrap_or_default();

        if !messages.is_empty() {
            debug!(queue = queue_name, count = messages.len(), "📥 Messages read");
        }
        Ok(messages)
    }

    /// Acknowledge a handled message (delete it)
    pub async fn ack(&self, queue_name: &str, message_id: i64) -> Result<()> {
        self.pgmq
            .delete(queue_name, message_id)
            .await
            .map_err(|e| OrchestratorError::queue(queue_name, "ack", e.to_string()))?;

        debug!(queue = queue_name, msg_id = message_id, "✅ Message acknowledged");
        Ok(())
    }

    /// Park a permanently undeliverable message (archive it)
    pub async fn park(&self, queue_name: &str, message_id: i64) -> Result<()> {
        self.pgmq
            .archive(queue_name, message_id)
            .await
            .map_err(|e| OrchestratorError::queue(queue_name, "park", e.to_string()))?;

        warn!(queue = queue_name, msg_id = message_id, "📦 Message parked as undeliverable");
        Ok(())
    }

    /// Liveness probe used by readiness checks
    pub async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pgmq.connection)
            .await
            .is_ok()
    }

    /// Best-effort per-queue backlog counts from the broker's management
    /// interface. Surfaces `Unsupported` when the interface is absent so
    /// callers can degrade the one read-only feature that needs it; a
    /// broker outage still classifies as unavailable, not unsupported.
    pub async fn queue_stats(&self) -> Result<Vec<QueueStats>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT queue_name, queue_length FROM pgmq.metrics_all()")
                .fetch_all(&self.pgmq.connection)
                .await
                .map_err(classify_metrics_error)?;

        Ok(rows
            .into_iter()
            .map(|(queue_name, pending_messages)| QueueStats {
                queue_name,
                pending_messages,
                consumers: None,
            })
            .collect())
    }

    /// Underlying pool, for advanced operations and probes
    pub fn pool(&self) -> &PgPool {
        &self.pgmq.connection
    }
}

/// A missing `pgmq.metrics_all()` means the management interface is absent
/// (`Unsupported`); everything else keeps the standard classification, so a
/// pool timeout still reads as the broker being down.
fn classify_metrics_error(err: sqlx::Error) -> OrchestratorError {
    if let sqlx::Error::Database(db_err) = &err {
        // 42883 undefined_function, 42P01 undefined_table
        if matches!(db_err.code().as_deref(), Some("42883") | Some("42P01")) {
            return OrchestratorError::unsupported("queue_stats", db_err.to_string());
        }
    }
    err.into()
}
