//! Integration tests for the priority request queue.
//!
//! This test validates:
//! 1. Higher priority pending work drains first, FIFO within a priority
//! 2. The in-flight cap is never exceeded
//! 3. Rate-limited actions are retried, not failed
//! 4. Other errors reach the caller without stalling the queue
//! 5. Depth limits, pause/resume and shutdown

mod common;

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::TestSpawner;
use parking_lot::Mutex;
use tribunal::config::QueueConfig;
use tribunal::core::{DispatchError, RequestQueue};
use tribunal::util::serde::Priority;

fn queue(max_in_flight: usize) -> RequestQueue<TestSpawner> {
    RequestQueue::new(
        QueueConfig {
            max_in_flight,
            max_queue_depth: 100,
            rate_limit_backoff_ms: 5,
            max_backoff_ms: 20,
        },
        TestSpawner,
    )
    .unwrap()
}

fn record(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl FnMut() -> std::future::Ready<Result<(), DispatchError>> + Send + 'static {
    let log = Arc::clone(log);
    move || {
        log.lock().push(name);
        std::future::ready(Ok(()))
    }
}

#[tokio::test]
async fn test_higher_priority_settles_first() {
    let q = queue(1);
    let log = Arc::new(Mutex::new(Vec::new()));

    q.pause();
    let low = q.submit(record(&log, "background"), Priority::Background).unwrap();
    let high = q.submit(record(&log, "admin"), Priority::Administrative).unwrap();
    let mid = q.submit(record(&log, "user"), Priority::EndUser).unwrap();
    q.resume();

    low.await.unwrap();
    high.await.unwrap();
    mid.await.unwrap();
    assert_eq!(*log.lock(), vec!["admin", "user", "background"]);
}

#[tokio::test]
async fn test_equal_priority_preserves_submission_order() {
    let q = queue(1);
    let log = Arc::new(Mutex::new(Vec::new()));

    q.pause();
    let handles: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|name| q.submit(record(&log, name), Priority::Moderator).unwrap())
        .collect();
    q.resume();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*log.lock(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_in_flight_task_is_not_preempted() {
    let q = queue(1);
    let log = Arc::new(Mutex::new(Vec::new()));

    let slow_log = Arc::clone(&log);
    let slow = q
        .submit(
            move || {
                let log = Arc::clone(&slow_log);
                async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    log.lock().push("slow-background");
                    Ok::<_, DispatchError>(())
                }
            },
            Priority::Background,
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let urgent = q.submit(record(&log, "admin"), Priority::Administrative).unwrap();

    slow.await.unwrap();
    urgent.await.unwrap();
    assert_eq!(*log.lock(), vec!["slow-background", "admin"]);
}

#[tokio::test]
async fn test_in_flight_cap_is_respected() {
    let q = queue(3);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
            q.submit(
                move || {
                    let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, DispatchError>(())
                    }
                },
                Priority::EndUser,
            )
            .unwrap()
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(q.stats().processed, 12);
    assert_eq!(q.stats().in_flight, 0);
}

#[tokio::test]
async fn test_rate_limited_action_is_retried_not_failed() {
    let q = queue(1);
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&attempts);
    let value = q
        .enqueue(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DispatchError::RateLimited { retry_after_ms: None })
                    } else {
                        Ok(n)
                    }
                }
            },
            Priority::Moderator,
        )
        .await
        .unwrap();

    assert_eq!(value, 2);
    let stats = q.stats();
    assert_eq!(stats.rate_limited, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.backing_off, 0);
}

#[tokio::test]
async fn test_failure_reaches_caller_and_queue_continues() {
    let q = queue(1);

    let failed = q
        .enqueue(
            || async { Err::<(), _>(DispatchError::ExternalUnavailable("member".into())) },
            Priority::EndUser,
        )
        .await;
    assert!(matches!(failed, Err(DispatchError::ExternalUnavailable(_))));

    let next = q.enqueue(|| async { Ok::<_, DispatchError>(7) }, Priority::EndUser).await;
    assert_eq!(next.unwrap(), 7);

    let stats = q.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.submitted, 2);
}

#[tokio::test]
async fn test_panicking_action_releases_its_slot() {
    let q = queue(1);

    let exploded = q
        .enqueue(
            || async {
                if true {
                    panic!("gateway payload malformed");
                }
                Ok::<(), DispatchError>(())
            },
            Priority::Moderator,
        )
        .await;
    match exploded {
        Err(DispatchError::External(msg)) => assert!(msg.contains("gateway payload malformed")),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Panics before the future exists still free the slot.
    let eager = q.submit(
        || -> std::future::Ready<Result<(), DispatchError>> { panic!("no future built") },
        Priority::Moderator,
    );
    assert!(eager.unwrap().await.is_err());

    let next = tokio::time::timeout(
        Duration::from_secs(1),
        q.enqueue(|| async { Ok::<_, DispatchError>(42) }, Priority::EndUser),
    )
    .await
    .expect("queue wedged after panic");
    assert_eq!(next.unwrap(), 42);

    let stats = q.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn test_queue_full_rejects_submission() {
    let q = RequestQueue::new(
        QueueConfig {
            max_in_flight: 1,
            max_queue_depth: 2,
            ..QueueConfig::default()
        },
        TestSpawner,
    )
    .unwrap();
    q.pause();
    let _a = q.submit(|| async { Ok::<_, DispatchError>(()) }, Priority::EndUser).unwrap();
    let _b = q.submit(|| async { Ok::<_, DispatchError>(()) }, Priority::EndUser).unwrap();
    let rejected = q.submit(|| async { Ok::<_, DispatchError>(()) }, Priority::Administrative);
    assert!(matches!(rejected, Err(DispatchError::QueueFull(_))));
    assert_eq!(q.stats().pending, 2);
    assert!(q.stats().paused);
}

#[tokio::test]
async fn test_shutdown_settles_pending_handles() {
    let q = queue(1);
    q.pause();
    let pending = q.submit(|| async { Ok::<_, DispatchError>(()) }, Priority::EndUser).unwrap();
    q.shutdown();

    assert!(matches!(pending.await, Err(DispatchError::Shutdown)));
    let late = q.submit(|| async { Ok::<_, DispatchError>(()) }, Priority::EndUser);
    assert!(matches!(late, Err(DispatchError::Shutdown)));
    q.wait_idle().await;
}

#[tokio::test]
async fn test_wait_idle_after_burst() {
    let q = queue(2);
    for _ in 0..5 {
        let _ = q
            .submit(
                || async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, DispatchError>(())
                },
                Priority::Background,
            )
            .unwrap();
    }
    q.wait_idle().await;
    let stats = q.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processed, 5);
}

#[test]
fn test_invalid_config_rejected() {
    let result = RequestQueue::new(
        QueueConfig {
            max_in_flight: 0,
            ..QueueConfig::default()
        },
        TestSpawner,
    );
    assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));
}
