//! End-to-end orchestration lifecycle tests.
//!
//! These run against a real Postgres with the pgmq extension and are
//! skipped when `TEST_DATABASE_URL` is not provided (CI without a database
//! still compiles and passes). Each test isolates itself with unique
//! capability keys and a unique response queue.

use std::time::Duration;

use anyhow::Result;
use mediatask_core::config::CoreConfig;
use mediatask_core::messaging::{QueueClient, WorkerResponse};
use mediatask_core::models::{Creator, DocumentSpec, Generator, Target, TaskFilter, TaskSpec};
use mediatask_core::orchestration::{Orchestrator, ResponseListener};
use mediatask_core::store::StoreAdapter;
use mediatask_core::{OrchestratorError, TaskState};
use uuid::Uuid;

fn unique(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &suffix[..8])
}

async fn setup() -> Option<Orchestrator> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        println!("Skipping lifecycle test - no TEST_DATABASE_URL provided");
        return None;
    };

    let mut config = CoreConfig::default();
    config.database.url = database_url;
    config.queue.response_queue = unique("responses");
    config.queue.poll_interval_seconds = 1;

    let store = StoreAdapter::connect(&config.database)
        .await
        .expect("store connection");
    store.ensure_schema().await.expect("schema bootstrap");
    let queue = QueueClient::with_pool(store.pool().clone()).await;

    Some(Orchestrator::new(store, queue, config))
}

fn video_document() -> DocumentSpec {
    DocumentSpec {
        id: None,
        target: Target {
            id: "ITM1".to_string(),
            url: "http://x/v.mp4".to_string(),
            kind: "Video".to_string(),
        },
        creator: Creator {
            id: "NISV".to_string(),
            kind: "Organization".to_string(),
        },
    }
}

fn task_spec(key: &str, priority: i32) -> TaskSpec {
    TaskSpec {
        id: None,
        key: key.to_string(),
        priority: Some(priority),
    }
}

/// Poll until the task reaches the expected state or time runs out
async fn wait_for_state(orchestrator: &Orchestrator, task_id: &str, state: i32) -> bool {
    for _ in 0..50 {
        let task = orchestrator.task(task_id).await.expect("task lookup");
        if task.state == state {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    false
}

#[tokio::test]
async fn test_register_then_get_round_trips() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };

    let registered = orchestrator.register_document(video_document()).await?;
    let fetched = orchestrator
        .document(&registered.document_id.to_string())
        .await?;

    assert_eq!(fetched, registered);
    assert_eq!(fetched.target().id, "ITM1");
    assert_eq!(fetched.creator().id, "NISV");
    Ok(())
}

#[tokio::test]
async fn test_register_with_caller_supplied_id_is_rejected() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };

    let mut spec = video_document();
    spec.id = Some("caller-picked".to_string());

    let err = orchestrator.register_document(spec).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Format { .. }));
    Ok(())
}

#[tokio::test]
async fn test_full_lifecycle_dispatch_complete_retry() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("shotdetection");

    // Register and assign
    let document = orchestrator.register_document(video_document()).await?;
    let doc_id = document.document_id.to_string();
    let task = orchestrator.assign_task(&task_spec(&key, 1), &doc_id).await?;
    let task_id = task.task_id.to_string();

    assert!(TaskState::from_code(task.state).is_in_flight());

    // Exactly one dispatch message sits on the capability queue
    let queue = orchestrator.queue_client();
    let dispatched = queue.read_batch(&key, Some(0), 10).await?;
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].message["task_id"], task_id);

    // Simulate the worker: consume the dispatch, report success
    queue.ack(&key, dispatched[0].msg_id).await?;
    let response = WorkerResponse {
        task_id: task.task_id,
        state: 200,
        msg: "Success".to_string(),
        generator: Some(Generator {
            id: "w1".to_string(),
            name: "shots".to_string(),
            homepage: "http://example.org".to_string(),
            kind: "Software".to_string(),
        }),
        payload: Some(serde_json::json!({"shots": 12})),
    };
    queue
        .publish_json(&orchestrator.config().queue.response_queue, &response)
        .await?;

    // The response consumer drains it in the background
    let listener = ResponseListener::new(orchestrator.clone()).start().await?;
    assert!(
        wait_for_state(&orchestrator, &task_id, 200).await,
        "task never reached success state"
    );
    listener.stop().await;

    // Exactly one result recorded under the task
    let results = orchestrator.results_for_task(&task_id).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].payload["shots"], 12);
    assert_eq!(results[0].generator_id, "w1");

    // Retry from the success state passes the in-flight guard, resets the
    // task and republishes
    let retried = orchestrator.retry_task(&task_id, false).await?;
    assert_eq!(retried.state, TaskState::Queued.code());
    assert_eq!(retried.msg, "");

    let redispatched = queue.read_batch(&key, Some(0), 10).await?;
    assert_eq!(redispatched.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_retry_guard_rejects_in_flight_without_force() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("asr");

    let document = orchestrator.register_document(video_document()).await?;
    let task = orchestrator
        .assign_task(&task_spec(&key, 5), &document.document_id.to_string())
        .await?;
    let task_id = task.task_id.to_string();

    // In flight: plain retry is rejected, state unchanged
    let err = orchestrator.retry_task(&task_id, false).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation { .. }));
    let unchanged = orchestrator.task(&task_id).await?;
    assert_eq!(unchanged.state, TaskState::Queued.code());

    // Forced retry bypasses the guard
    let forced = orchestrator.retry_task(&task_id, true).await?;
    assert_eq!(forced.state, TaskState::Queued.code());

    // Reset works from any state and publishes exactly one more dispatch
    let before = orchestrator
        .queue_client()
        .read_batch(&key, Some(0), 50)
        .await?
        .len();
    let reset = orchestrator.reset_task(&task_id).await?;
    assert_eq!(reset.state, TaskState::Queued.code());
    assert_eq!(reset.msg, "");
    let after = orchestrator
        .queue_client()
        .read_batch(&key, Some(0), 50)
        .await?
        .len();
    assert_eq!(after, before + 1);
    Ok(())
}

#[tokio::test]
async fn test_assign_many_partitions_successes_and_failures() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("ocr");

    let d1 = orchestrator.register_document(video_document()).await?;
    let d2 = orchestrator.register_document(video_document()).await?;
    let missing = Uuid::new_v4().to_string();

    let ids = vec![
        d1.document_id.to_string(),
        "not-a-uuid".to_string(),
        d2.document_id.to_string(),
        missing.clone(),
    ];

    let outcome = orchestrator.assign_tasks(&task_spec(&key, 5), &ids).await;

    assert_eq!(outcome.success.len(), 2);
    assert_eq!(outcome.failed.len(), 2);
    assert!(outcome
        .failed
        .iter()
        .any(|f| f.document_id == "not-a-uuid"));
    assert!(outcome.failed.iter().any(|f| f.document_id == missing));

    // Exactly one task record per successful document
    for doc in [&d1, &d2] {
        let tasks = orchestrator
            .tasks_for_document(&doc.document_id.to_string())
            .await?;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].key, key);
    }
    Ok(())
}

#[tokio::test]
async fn test_unfinished_excludes_success_only() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("transcode");

    let document = orchestrator.register_document(video_document()).await?;
    let doc_id = document.document_id.to_string();
    let queued = orchestrator.assign_task(&task_spec(&key, 5), &doc_id).await?;
    let failed = orchestrator.assign_task(&task_spec(&key, 5), &doc_id).await?;
    let succeeded = orchestrator.assign_task(&task_spec(&key, 5), &doc_id).await?;

    // Apply worker reports directly (the consumer path is covered elsewhere)
    orchestrator
        .on_worker_result(&WorkerResponse {
            task_id: failed.task_id,
            state: 500,
            msg: "worker crashed".to_string(),
            generator: None,
            payload: None,
        })
        .await?;
    orchestrator
        .on_worker_result(&WorkerResponse {
            task_id: succeeded.task_id,
            state: 200,
            msg: "Success".to_string(),
            generator: None,
            payload: None,
        })
        .await?;

    let unfinished = orchestrator.unfinished_tasks().await?;
    let ids: Vec<_> = unfinished.iter().map(|t| t.task_id).collect();

    assert!(ids.contains(&queued.task_id));
    assert!(ids.contains(&failed.task_id), "error states stay unfinished");
    assert!(!ids.contains(&succeeded.task_id));

    // A success report without payload records no result
    let results = orchestrator
        .results_for_task(&succeeded.task_id.to_string())
        .await?;
    assert!(results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_document_deletion_cascades_and_batch_tolerates_missing() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("facedetect");

    let document = orchestrator.register_document(video_document()).await?;
    let doc_id = document.document_id.to_string();
    let task = orchestrator.assign_task(&task_spec(&key, 5), &doc_id).await?;
    let task_id = task.task_id.to_string();

    orchestrator
        .on_worker_result(&WorkerResponse {
            task_id: task.task_id,
            state: 200,
            msg: "Success".to_string(),
            generator: None,
            payload: Some(serde_json::json!({"ok": true})),
        })
        .await?;
    let result_id = orchestrator.results_for_task(&task_id).await?[0]
        .result_id
        .to_string();

    // Batch delete with a missing id stays silent; the real one cascades
    let missing = Uuid::new_v4().to_string();
    orchestrator
        .delete_documents(&[doc_id.clone(), missing])
        .await;

    assert!(matches!(
        orchestrator.document(&doc_id).await.unwrap_err(),
        OrchestratorError::NotFound { .. }
    ));
    assert!(matches!(
        orchestrator.task(&task_id).await.unwrap_err(),
        OrchestratorError::NotFound { .. }
    ));
    assert!(matches!(
        orchestrator.result(&result_id).await.unwrap_err(),
        OrchestratorError::NotFound { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_search_with_wildcard_sentinel() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };

    let mut spec = video_document();
    spec.target.id = unique("ITM");
    spec.creator.id = unique("ORG");
    let document = orchestrator.register_document(spec.clone()).await?;

    let by_both = orchestrator
        .search(&spec.target.id, &spec.creator.id)
        .await?;
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0].document_id, document.document_id);

    let by_target_any_creator = orchestrator.search(&spec.target.id, "*").await?;
    assert_eq!(by_target_any_creator.len(), 1);

    let no_match = orchestrator.search(&spec.target.id, "someone-else").await?;
    assert!(no_match.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_readiness_reports_both_dependencies() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };

    let report = orchestrator.readiness().await;
    assert!(report.database);
    assert!(report.messagequeue);
    assert!(report.ready);
    Ok(())
}

#[tokio::test]
async fn test_worker_status_reports_backlog() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("speechrec");

    let document = orchestrator.register_document(video_document()).await?;
    orchestrator
        .assign_task(&task_spec(&key, 5), &document.document_id.to_string())
        .await?;

    let stats = orchestrator.worker_status().await?;
    let entry = stats
        .iter()
        .find(|s| s.queue_name == key)
        .expect("assigned key shows up in queue stats");
    assert!(entry.pending_messages >= 1);
    assert!(entry.consumers.is_none());
    Ok(())
}

#[tokio::test]
async fn test_search_tasks_filters_by_state_set_and_key() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key_a = unique("segmenting");
    let key_b = unique("captioning");

    let document = orchestrator.register_document(video_document()).await?;
    let doc_id = document.document_id.to_string();
    let done_a = orchestrator.assign_task(&task_spec(&key_a, 5), &doc_id).await?;
    let open_a = orchestrator.assign_task(&task_spec(&key_a, 5), &doc_id).await?;
    let open_b = orchestrator.assign_task(&task_spec(&key_b, 5), &doc_id).await?;

    orchestrator
        .on_worker_result(&WorkerResponse {
            task_id: done_a.task_id,
            state: 200,
            msg: "Success".to_string(),
            generator: None,
            payload: None,
        })
        .await?;

    let store = orchestrator.store();

    // Key arm alone matches both tasks on that key
    let by_key = store
        .search_tasks(&TaskFilter {
            states_not_in: vec![],
            key: Some(key_a.clone()),
        })
        .await?;
    let ids: Vec<_> = by_key.iter().map(|t| t.task_id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&done_a.task_id));
    assert!(ids.contains(&open_a.task_id));

    // State-exclusion arm drops the completed task and keeps the rest
    let not_done = store
        .search_tasks(&TaskFilter {
            states_not_in: vec![200],
            key: None,
        })
        .await?;
    let ids: Vec<_> = not_done.iter().map(|t| t.task_id).collect();
    assert!(!ids.contains(&done_a.task_id));
    assert!(ids.contains(&open_a.task_id));
    assert!(ids.contains(&open_b.task_id));

    // Both arms together
    let open_on_key = store
        .search_tasks(&TaskFilter {
            states_not_in: vec![200],
            key: Some(key_a.clone()),
        })
        .await?;
    assert_eq!(open_on_key.len(), 1);
    assert_eq!(open_on_key[0].task_id, open_a.task_id);
    Ok(())
}

#[tokio::test]
async fn test_stale_version_write_is_rejected() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("indexing");

    let document = orchestrator.register_document(video_document()).await?;
    let task = orchestrator
        .assign_task(&task_spec(&key, 5), &document.document_id.to_string())
        .await?;
    let store = orchestrator.store();

    // A write against the live version lands and bumps it
    let updated = store
        .update_task_state(task.task_id, task.version, 500, "worker crashed")
        .await?
        .expect("live version accepted");
    assert_eq!(updated.version, task.version + 1);

    // Replaying the old version writes nothing
    let stale = store
        .update_task_state(task.task_id, task.version, 200, "Success")
        .await?;
    assert!(stale.is_none());
    let current = orchestrator.task(&task.task_id.to_string()).await?;
    assert_eq!(current.state, 500);

    // The completion path re-reads the fresh version and still lands
    orchestrator
        .on_worker_result(&WorkerResponse {
            task_id: task.task_id,
            state: 200,
            msg: "Success".to_string(),
            generator: None,
            payload: None,
        })
        .await?;
    let current = orchestrator.task(&task.task_id.to_string()).await?;
    assert_eq!(current.state, 200);
    assert_eq!(current.version, updated.version + 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_completion_and_retry_never_lose_a_write() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("diarization");

    let document = orchestrator.register_document(video_document()).await?;
    let task = orchestrator
        .assign_task(&task_spec(&key, 5), &document.document_id.to_string())
        .await?;
    let task_id = task.task_id.to_string();

    let completer = orchestrator.clone();
    let retrier = orchestrator.clone();
    let completer_id = task.task_id;
    let retrier_id = task_id.clone();
    let (worker, retry) = tokio::join!(
        async move {
            completer
                .on_worker_result(&WorkerResponse {
                    task_id: completer_id,
                    state: 500,
                    msg: "worker crashed".to_string(),
                    generator: None,
                    payload: None,
                })
                .await
        },
        async move { retrier.retry_task(&retrier_id, true).await },
    );

    // Either writer may win the version check, but neither outcome is
    // silent: each call returns the refreshed task or a surfaced conflict.
    let mut landed_writes: i64 = 0;
    for outcome in [worker.map(|_| ()), retry.map(|_| ())] {
        match outcome {
            Ok(()) => landed_writes += 1,
            Err(OrchestratorError::VersionConflict { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let final_task = orchestrator.task(&task_id).await?;
    assert_eq!(final_task.version, task.version + landed_writes);
    assert!(
        final_task.state == 500 || final_task.state == TaskState::Queued.code(),
        "final state must come from one of the two writers, got {}",
        final_task.state
    );
    Ok(())
}

#[tokio::test]
async fn test_exhausted_conflict_budget_surfaces() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };
    let key = unique("thumbnailing");

    let document = orchestrator.register_document(video_document()).await?;
    let task = orchestrator
        .assign_task(&task_spec(&key, 5), &document.document_id.to_string())
        .await?;

    // Zero conditional-write attempts: every mutation exhausts its budget
    // immediately, so the conflict error must surface instead of being
    // swallowed.
    let mut config = orchestrator.config().clone();
    config.retry.version_conflict_retries = 0;
    let no_budget = Orchestrator::new(
        orchestrator.store().clone(),
        orchestrator.queue_client().clone(),
        config,
    );

    let err = no_budget
        .on_worker_result(&WorkerResponse {
            task_id: task.task_id,
            state: 200,
            msg: "Success".to_string(),
            generator: None,
            payload: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::VersionConflict { .. }));
    assert!(err.is_transient());

    let err = no_budget
        .retry_task(&task.task_id.to_string(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::VersionConflict { .. }));

    // The task itself is untouched by the failed attempts
    let unchanged = orchestrator.task(&task.task_id.to_string()).await?;
    assert_eq!(unchanged.version, task.version);
    assert_eq!(unchanged.state, task.state);
    Ok(())
}

#[tokio::test]
async fn test_malformed_id_is_validation_not_notfound() -> Result<()> {
    let Some(orchestrator) = setup().await else { return Ok(()) };

    assert!(matches!(
        orchestrator.document("][").await.unwrap_err(),
        OrchestratorError::Validation { .. }
    ));
    assert!(matches!(
        orchestrator
            .document(&Uuid::new_v4().to_string())
            .await
            .unwrap_err(),
        OrchestratorError::NotFound { .. }
    ));
    Ok(())
}
