//! Benchmarks for the dispatch path.
//!
//! Benchmarks cover:
//! - Pending-heap operations (enqueue/dequeue/priority ordering)
//! - Request queue throughput under the in-flight cap
//! - Batch fan-out with per-label bounds

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use tokio::runtime::Runtime;
use tribunal::config::{BatchConfig, QueueConfig};
use tribunal::core::batch::LABEL_MESSAGE_SCAN;
use tribunal::core::{BatchExecutor, DispatchError, RequestQueue};
use tribunal::infra::queue::memory::{InMemoryQueue, QueuedTask, TaskMetadata};
use tribunal::runtime::TokioSpawner;
use tribunal::util::clock::now_ms;
use tribunal::util::serde::Priority;

const PRIORITIES: [Priority; 5] = [
    Priority::Unclassified,
    Priority::Background,
    Priority::EndUser,
    Priority::Moderator,
    Priority::Administrative,
];

fn build_task(id: u64, priority: Priority) -> QueuedTask<u64> {
    QueuedTask {
        meta: TaskMetadata {
            id,
            priority,
            enqueued_at_ms: now_ms(),
            attempts: 0,
        },
        payload: id,
    }
}

// ============================================================================
// Pending heap
// ============================================================================

fn bench_heap_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap_enqueue_dequeue");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut queue = InMemoryQueue::new(size as usize);
                for id in 0..size {
                    queue.enqueue(build_task(id, Priority::EndUser)).unwrap();
                }
                while let Some(task) = queue.dequeue() {
                    black_box(task.payload);
                }
            });
        });
    }
    group.finish();
}

fn bench_heap_priority_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap_priority_ordering");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut queue = InMemoryQueue::new(size as usize);
                for id in 0..size {
                    let priority = PRIORITIES[(id % 5) as usize];
                    queue.enqueue(build_task(id, priority)).unwrap();
                }
                let mut last = Priority::Administrative;
                while let Some(task) = queue.dequeue() {
                    assert!(task.meta.priority <= last);
                    last = task.meta.priority;
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Request queue
// ============================================================================

fn bench_request_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_queue_throughput");

    for task_count in [100_u64, 1_000] {
        group.throughput(Throughput::Elements(task_count));
        group.bench_with_input(
            BenchmarkId::from_parameter(task_count),
            &task_count,
            |b, &task_count| {
                b.to_async(Runtime::new().unwrap()).iter(|| async move {
                    let config = QueueConfig {
                        max_in_flight: 3,
                        max_queue_depth: task_count as usize,
                        ..QueueConfig::default()
                    };
                    let queue = RequestQueue::new(config, TokioSpawner::current()).unwrap();
                    let handles: Vec<_> = (0..task_count)
                        .map(|n| {
                            let priority = PRIORITIES[(n % 5) as usize];
                            queue
                                .submit(move || async move { Ok::<_, DispatchError>(n) }, priority)
                                .unwrap()
                        })
                        .collect();
                    for handle in handles {
                        black_box(handle.await.unwrap());
                    }
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// Batch fan-out
// ============================================================================

fn bench_batch_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_fan_out");
    group.sample_size(20);

    group.bench_function("message_scan_200_items", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| async {
            let batch = BatchExecutor::new(BatchConfig::default());
            let results = batch
                .process_batch(
                    (0..200_u64).collect::<Vec<_>>(),
                    |n| async move {
                        tokio::time::sleep(Duration::from_micros(50)).await;
                        Ok::<_, DispatchError>(n)
                    },
                    |p| {
                        black_box(p);
                    },
                    LABEL_MESSAGE_SCAN,
                )
                .await;
            black_box(results.len());
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_heap_enqueue_dequeue,
    bench_heap_priority_ordering,
    bench_request_queue_throughput,
    bench_batch_fan_out,
);
criterion_main!(benches);
