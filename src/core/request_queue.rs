//! Global priority request queue.
//!
//! Every outbound platform call is funnelled through a single [`RequestQueue`],
//! which caps the number of in-flight calls and drains pending work highest
//! priority first, FIFO within a priority. In-flight tasks are never preempted.
//!
//! A task whose action fails with [`DispatchError::RateLimited`] is put back
//! at its original priority and submission sequence after a backoff and is
//! not counted as a failure. Any other error is handed to the caller and
//! bumps the failure counter.
//!
//! ```rust,ignore
//! let queue = RequestQueue::new(QueueConfig::default(), TokioSpawner::current())?;
//! let id = queue
//!     .enqueue(move || { let p = platform.clone(); async move { p.send_message(&ch, "hi").await } },
//!              Priority::Moderator)
//!     .await?;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::core::executor::{erase, panic_message, Attempt, Job, Spawn};
use crate::core::DispatchError;
use crate::infra::queue::memory::{InMemoryQueue, QueuedTask, TaskMetadata};
use crate::runtime::TokioSpawner;
use crate::util::clock::now_ms;
use crate::util::serde::{Priority, TaskId};

/// Point-in-time queue counters for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting for a slot.
    pub pending: usize,
    /// Tasks currently executing.
    pub in_flight: usize,
    /// Rate-limited tasks waiting out their backoff.
    pub backing_off: usize,
    /// Tasks that settled successfully.
    pub processed: u64,
    /// Tasks that settled with a non-rate-limit error.
    pub failed: u64,
    /// Rate-limited attempts (not failures).
    pub rate_limited: u64,
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Whether draining is paused.
    pub paused: bool,
}

#[derive(Debug, Default)]
struct QueueCounters {
    processed: AtomicU64,
    failed: AtomicU64,
    rate_limited: AtomicU64,
    submitted: AtomicU64,
}

struct Shared {
    config: QueueConfig,
    pending: Mutex<InMemoryQueue<Job>>,
    in_flight: AtomicUsize,
    backing_off: AtomicUsize,
    next_id: AtomicU64,
    paused: AtomicBool,
    shutdown: AtomicBool,
    counters: QueueCounters,
    idle: Notify,
}

impl Shared {
    fn backoff_for(&self, attempts: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempts.min(16)).unwrap_or(u64::MAX);
        let ms = self
            .config
            .rate_limit_backoff_ms
            .saturating_mul(factor)
            .min(self.config.max_backoff_ms);
        Duration::from_millis(ms)
    }

    fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == 0
            && self.backing_off.load(Ordering::Acquire) == 0
            && self.pending.lock().is_empty()
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Awaitable result of a submitted task.
///
/// Resolves to [`DispatchError::Shutdown`] if the queue is shut down before
/// the task settles.
#[must_use = "a task handle does nothing unless awaited"]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: oneshot::Receiver<Result<T, DispatchError>>,
}

impl<T> TaskHandle<T> {
    /// Queue-assigned task id.
    pub const fn id(&self) -> TaskId {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, DispatchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::Shutdown)))
    }
}

/// Priority-ordered, concurrency-capped dispatcher for external calls.
///
/// Cheap to clone; clones share the same queue.
pub struct RequestQueue<S = TokioSpawner> {
    shared: Arc<Shared>,
    spawner: S,
}

impl<S: Clone> Clone for RequestQueue<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> RequestQueue<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a queue from validated configuration.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidConfig` when the configuration fails validation.
    pub fn new(config: QueueConfig, spawner: S) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::InvalidConfig)?;
        info!(
            max_in_flight = config.max_in_flight,
            max_queue_depth = config.max_queue_depth,
            "request queue initialized"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(InMemoryQueue::new(config.max_queue_depth)),
                config,
                in_flight: AtomicUsize::new(0),
                backing_off: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                paused: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                counters: QueueCounters::default(),
                idle: Notify::new(),
            }),
            spawner,
        })
    }

    /// Submit an action and return a handle to its eventual outcome.
    ///
    /// The action is re-invoked for each rate-limited retry.
    ///
    /// # Errors
    ///
    /// `QueueFull` at capacity, `Shutdown` after [`shutdown`](Self::shutdown).
    pub fn submit<T, F, Fut>(&self, action: F, priority: Priority) -> Result<TaskHandle<T>, DispatchError>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
    {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::Shutdown);
        }
        let (tx, rx) = oneshot::channel();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let task = QueuedTask {
            meta: TaskMetadata {
                id,
                priority,
                enqueued_at_ms: now_ms(),
                attempts: 0,
            },
            payload: erase(action, tx),
        };
        {
            let mut pending = self.shared.pending.lock();
            if let Err(err) = pending.enqueue(task) {
                warn!(task_id = id, %priority, "task rejected: queue full");
                return Err(err);
            }
        }
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = id, %priority, "task enqueued");
        Self::pump(&self.shared, &self.spawner);
        Ok(TaskHandle { id, rx })
    }

    /// Submit an action and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Submission errors, or the action's own non-rate-limit error.
    pub async fn enqueue<T, F, Fut>(&self, action: F, priority: Priority) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
    {
        self.submit(action, priority)?.await
    }

    /// Stop starting new tasks. In-flight tasks run to completion.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
        info!("request queue paused");
    }

    /// Resume draining after [`pause`](Self::pause).
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
        info!("request queue resumed");
        Self::pump(&self.shared, &self.spawner);
    }

    /// Reject new work and settle every pending handle with `Shutdown`.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = self.shared.pending.lock().clear();
        info!(dropped, "request queue shut down");
        self.shared.notify_if_idle();
    }

    /// Wait until nothing is pending, in flight, or backing off.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Snapshot of the live counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let counters = &self.shared.counters;
        QueueStats {
            pending: self.shared.pending.lock().len(),
            in_flight: self.shared.in_flight.load(Ordering::Acquire),
            backing_off: self.shared.backing_off.load(Ordering::Acquire),
            processed: counters.processed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            rate_limited: counters.rate_limited.load(Ordering::Relaxed),
            submitted: counters.submitted.load(Ordering::Relaxed),
            paused: self.shared.paused.load(Ordering::Acquire),
        }
    }

    /// Start as many pending tasks as free slots allow.
    ///
    /// The slot check and reservation happen under the pending lock so two
    /// concurrent pumps cannot overshoot the cap.
    fn pump(shared: &Arc<Shared>, spawner: &S) {
        loop {
            let task = {
                let mut pending = shared.pending.lock();
                if shared.paused.load(Ordering::Acquire)
                    || shared.in_flight.load(Ordering::Acquire) >= shared.config.max_in_flight
                {
                    return;
                }
                let Some(task) = pending.dequeue() else {
                    return;
                };
                shared.in_flight.fetch_add(1, Ordering::AcqRel);
                task
            };
            debug!(
                task_id = task.meta.id,
                priority = %task.meta.priority,
                waited_ms = now_ms().saturating_sub(task.meta.enqueued_at_ms),
                "task started"
            );
            let shared = Arc::clone(shared);
            let task_spawner = spawner.clone();
            spawner.spawn(async move {
                Self::run(shared, task_spawner, task).await;
            });
        }
    }

    async fn run(shared: Arc<Shared>, spawner: S, mut task: QueuedTask<Job>) {
        let task_id = task.meta.id;
        // Jobs catch panics in the caller's future; this covers a panic while
        // building it, so the slot is still released.
        let attempt = match AssertUnwindSafe(async { (task.payload)().await })
            .catch_unwind()
            .await
        {
            Ok(attempt) => attempt,
            Err(payload) => {
                error!(task_id, panic = panic_message(payload.as_ref()), "queued job panicked");
                Attempt::Failed("panic")
            }
        };

        // Counters settle before the slot is released.
        match attempt {
            Attempt::Settled => {
                shared.counters.processed.fetch_add(1, Ordering::Relaxed);
                debug!(task_id, "task completed");
            }
            Attempt::Failed(kind) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(task_id, kind, "task failed");
            }
            Attempt::RateLimited(hint) => {
                shared.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                let delay = hint.unwrap_or_else(|| shared.backoff_for(task.meta.attempts));
                task.meta.attempts += 1;
                warn!(
                    task_id,
                    attempts = task.meta.attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "task rate limited, requeueing"
                );
                shared.backing_off.fetch_add(1, Ordering::AcqRel);
                let retry_shared = Arc::clone(&shared);
                let retry_spawner = spawner.clone();
                spawner.spawn(async move {
                    tokio::time::sleep(delay).await;
                    retry_shared.backing_off.fetch_sub(1, Ordering::AcqRel);
                    if retry_shared.shutdown.load(Ordering::Acquire) {
                        // Dropping the job drops its sender; the handle sees Shutdown.
                        drop(task);
                        retry_shared.notify_if_idle();
                        return;
                    }
                    retry_shared.pending.lock().requeue(task);
                    Self::pump(&retry_shared, &retry_spawner);
                });
            }
        }

        shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        Self::pump(&shared, &spawner);
        shared.notify_if_idle();
    }
}
