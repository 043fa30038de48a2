//! # Response Consumer
//!
//! The background loop that drains the shared response queue for the
//! service's lifetime, independent of request handling. A supervised tokio
//! task with an explicit start/stop lifecycle: started after the store
//! adapter and queue client are constructed, stopped cleanly on shutdown
//! (it finishes the batch in hand, never mid-message).
//!
//! Disposition rules per message:
//! - handled → acknowledge (delete)
//! - unparseable or referencing a missing task → park (archive) and log as
//!   permanently undeliverable
//! - transient store/broker failure → leave unacknowledged; the visibility
//!   timeout redelivers it

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::messaging::WorkerResponse;

use super::handler::Orchestrator;

/// What to do with a drained message after a handling attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Ack,
    Park,
    Leave,
}

/// Response-queue consumer with an explicit lifecycle
pub struct ResponseListener {
    orchestrator: Orchestrator,
}

/// Handle for stopping a running listener
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal shutdown and wait for the loop to finish its current batch
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join_handle.await {
            error!(error = %e, "Response listener task panicked");
        }
    }
}

impl ResponseListener {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Ensure the response queue exists and spawn the consumption loop
    pub async fn start(self) -> Result<ListenerHandle> {
        let queue_config = self.orchestrator.config().queue.clone();
        self.orchestrator
            .queue_client()
            .ensure_queue(&queue_config.response_queue)
            .await?;

        info!(
            queue = %queue_config.response_queue,
            poll_interval = queue_config.poll_interval_seconds,
            "👂 Response listener starting"
        );

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let orchestrator = self.orchestrator;

        let join_handle = tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                match process_batch(&orchestrator).await {
                    Ok(processed) if processed > 0 => {
                        // Keep draining while the queue has messages
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Transient broker errors back off and retry; the
                        // loop never terminates on them
                        warn!(error = %e, "Response batch failed; backing off");
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = sleep(Duration::from_secs(
                        orchestrator.config().queue.poll_interval_seconds,
                    )) => {}
                }
            }

            info!("👂 Response listener stopped");
        });

        Ok(ListenerHandle {
            shutdown_tx,
            join_handle,
        })
    }
}

/// Drain one batch from the response queue. Returns how many messages were
/// settled (acknowledged or parked).
async fn process_batch(orchestrator: &Orchestrator) -> Result<usize> {
    let queue_config = &orchestrator.config().queue;
    let queue = orchestrator.queue_client();

    let messages = queue
        .read_batch(
            &queue_config.response_queue,
            Some(queue_config.visibility_timeout_seconds),
            queue_config.response_batch_size,
        )
        .await?;

    if messages.is_empty() {
        return Ok(0);
    }

    let mut settled = 0;
    for message in messages {
        let disposition = handle_message(orchestrator, &message.message).await;

        match disposition {
            Disposition::Ack => {
                queue
                    .ack(&queue_config.response_queue, message.msg_id)
                    .await?;
                settled += 1;
            }
            Disposition::Park => {
                queue
                    .park(&queue_config.response_queue, message.msg_id)
                    .await?;
                settled += 1;
            }
            Disposition::Leave => {
                debug!(
                    msg_id = message.msg_id,
                    "Leaving message for redelivery after transient failure"
                );
            }
        }
    }

    Ok(settled)
}

/// Apply one completion message and classify the outcome
async fn handle_message(orchestrator: &Orchestrator, raw: &serde_json::Value) -> Disposition {
    let response: WorkerResponse = match serde_json::from_value(raw.clone()) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Unparseable worker response; parking as undeliverable");
            return Disposition::Park;
        }
    };

    match orchestrator.on_worker_result(&response).await {
        Ok(_) => Disposition::Ack,
        Err(e) if e.is_transient() => {
            warn!(task_id = %response.task_id, error = %e, "Transient failure applying worker result");
            Disposition::Leave
        }
        Err(e) => {
            error!(
                task_id = %response.task_id,
                error = %e,
                "Worker response permanently undeliverable; parking"
            );
            Disposition::Park
        }
    }
}
