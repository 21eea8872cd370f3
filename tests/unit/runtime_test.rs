//! Tests for tokio spawner utilities and handler routing

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tribunal::config::QueueConfig;
use tribunal::core::{DispatchError, RequestQueue, Spawn};
use tribunal::runtime::tokio_spawner::TokioSpawner;
use tribunal::runtime::{route_interaction, status_report, submit_command};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_commands_and_ordered_interactions_are_queued() {
    let queue = RequestQueue::new(QueueConfig::default(), TokioSpawner::current()).unwrap();

    let out = submit_command(&queue, "mod_query_records", || async { Ok::<_, DispatchError>("records") })
        .await
        .unwrap();
    assert_eq!(out, "records");

    route_interaction(&queue, "support_42", || async { Ok::<_, DispatchError>(()) })
        .await
        .unwrap();
    assert_eq!(queue.stats().submitted, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unordered_interactions_bypass_queue() {
    let queue = RequestQueue::new(QueueConfig::default(), TokioSpawner::current()).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&calls);
    route_interaction(&queue, "page_next", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, DispatchError>(()) }
    })
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(queue.stats().submitted, 0);

    queue.pause();
    let report = status_report(&queue, std::time::Duration::from_secs(90));
    assert!(report.starts_with("Uptime: 1m"));
    assert!(report.ends_with("Queue is paused"));
}
