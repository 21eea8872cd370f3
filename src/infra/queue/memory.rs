//! In-memory pending-task heap with priority and submission-order awareness.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::error::DispatchError;
use crate::util::serde::{Priority, TaskId};

/// Scheduling metadata carried by every queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMetadata {
    /// Submission sequence; doubles as the FIFO tie-breaker within a priority.
    pub id: TaskId,
    /// Priority used for queue ordering.
    pub priority: Priority,
    /// Enqueue timestamp in milliseconds since epoch.
    pub enqueued_at_ms: u64,
    /// Number of rate-limited attempts so far.
    pub attempts: u32,
}

/// A unit of deferred work with its scheduling metadata.
pub struct QueuedTask<P> {
    /// Metadata driving scheduling decisions.
    pub meta: TaskMetadata,
    /// Deferred action supplied by the caller.
    pub payload: P,
}

/// Wrapper ordering tasks by priority (highest first), then by submission sequence.
struct PriorityTask<P> {
    task: QueuedTask<P>,
}

impl<P> PartialEq for PriorityTask<P> {
    fn eq(&self, other: &Self) -> bool {
        self.task.meta.id == other.task.meta.id
    }
}

impl<P> Eq for PriorityTask<P> {}

impl<P> PartialOrd for PriorityTask<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for PriorityTask<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.task.meta.priority.cmp(&other.task.meta.priority) {
            // Lower sequence wins; reversed for the max-heap.
            Ordering::Equal => other.task.meta.id.cmp(&self.task.meta.id),
            unequal => unequal,
        }
    }
}

/// In-memory queue storing pending tasks in a binary heap.
/// O(log n) enqueue and dequeue.
pub struct InMemoryQueue<P> {
    max_depth: usize,
    tasks: BinaryHeap<PriorityTask<P>>,
}

impl<P> InMemoryQueue<P> {
    /// Create a new in-memory queue with a maximum depth.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            tasks: BinaryHeap::with_capacity(max_depth.min(1024)),
        }
    }

    /// Push a task if space permits.
    ///
    /// # Errors
    ///
    /// `DispatchError::QueueFull` when the queue is at `max_depth`.
    pub fn enqueue(&mut self, task: QueuedTask<P>) -> Result<(), DispatchError> {
        if self.tasks.len() >= self.max_depth {
            return Err(DispatchError::QueueFull(format!(
                "{} tasks pending",
                self.tasks.len()
            )));
        }
        self.tasks.push(PriorityTask { task });
        Ok(())
    }

    /// Push a task that was already admitted once (rate-limit requeue).
    /// Bypasses the depth check so a throttled task is never dropped.
    pub fn requeue(&mut self, task: QueuedTask<P>) {
        self.tasks.push(PriorityTask { task });
    }

    /// Pop the highest-priority, earliest-submitted task.
    pub fn dequeue(&mut self) -> Option<QueuedTask<P>> {
        self.tasks.pop().map(|pt| pt.task)
    }

    /// Drop every pending task, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        removed
    }

    /// Maximum depth allowed for this queue.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
