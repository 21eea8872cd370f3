//! Bounded-concurrency fan-out over item lists.
//!
//! Workers usually route their own external calls back through the
//! [`RequestQueue`](crate::core::RequestQueue), so the batch bound limits
//! internal fan-out while the queue still caps real platform traffic.

use std::future::Future;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BatchConfig;
use crate::core::DispatchError;

/// Label for thread existence checks.
pub const LABEL_THREAD_CHECK: &str = "thread_check";
/// Label for read-only message scans.
pub const LABEL_MESSAGE_SCAN: &str = "message_scan";
/// Label for member lookups.
pub const LABEL_MEMBER_FETCH: &str = "member_fetch";
/// Label for member removals.
pub const LABEL_MEMBER_REMOVE: &str = "member_remove";
/// Label for individual message deletions.
pub const LABEL_MESSAGE_DELETE: &str = "message_delete";

/// Outcome of one batch item.
#[derive(Debug)]
pub enum BatchResult<T> {
    /// The worker returned a value.
    Completed(T),
    /// The worker returned an error; the batch carried on.
    Failed(DispatchError),
}

/// Item status, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Worker succeeded.
    Completed,
    /// Worker failed.
    Failed,
}

impl<T> BatchResult<T> {
    /// Status of this result.
    #[must_use]
    pub const fn status(&self) -> BatchStatus {
        match self {
            Self::Completed(_) => BatchStatus::Completed,
            Self::Failed(_) => BatchStatus::Failed,
        }
    }

    /// Whether the worker succeeded.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Value for completed items.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Error for failed items.
    #[must_use]
    pub const fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Progress snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Items finished so far, either way.
    pub done: usize,
    /// Total items in the batch.
    pub total: usize,
}

/// Aggregated pass/fail counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items whose worker succeeded.
    pub completed: usize,
    /// Items that failed and should be reported.
    pub failed: usize,
    /// Items that failed as not applicable.
    pub skipped: usize,
}

impl BatchSummary {
    /// Count outcomes, separating skips from real failures.
    #[must_use]
    pub fn from_results<T>(results: &[BatchResult<T>]) -> Self {
        results.iter().fold(Self::default(), |mut acc, result| {
            match result {
                BatchResult::Completed(_) => acc.completed += 1,
                BatchResult::Failed(err) if err.is_skip() => acc.skipped += 1,
                BatchResult::Failed(_) => acc.failed += 1,
            }
            acc
        })
    }

    /// Total items counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

/// Render a fixed-width text progress bar, e.g. `Purging [#####-----] 50% (5/10) messages`.
#[must_use]
pub fn progress_report(current: usize, total: usize, prefix: &str, suffix: &str) -> String {
    const WIDTH: usize = 20;
    let current = current.min(total);
    let (filled, percent) = if total == 0 {
        (WIDTH, 100)
    } else {
        (current * WIDTH / total, current * 100 / total)
    };
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(WIDTH - filled));
    let mut line = format!("{prefix} [{bar}] {percent}% ({current}/{total})");
    if !suffix.is_empty() {
        line.push(' ');
        line.push_str(suffix);
    }
    line
}

/// Runs a worker over many items with a per-label concurrency bound.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    config: BatchConfig,
}

impl BatchExecutor {
    /// Create an executor from batch configuration.
    #[must_use]
    pub const fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Concurrency bound applied to `label`.
    #[must_use]
    pub fn concurrency_for(&self, label: &str) -> usize {
        self.config.concurrency_for(label)
    }

    /// Run `worker` over `items`, at most `concurrency_for(label)` at a time.
    ///
    /// `results[i]` always corresponds to `items[i]`. A failing item never
    /// aborts the batch. `on_progress` fires at most once per
    /// `progress_interval_ms`, plus once when the batch finishes.
    pub async fn process_batch<I, T, F, Fut, P>(
        &self,
        items: Vec<I>,
        worker: F,
        mut on_progress: P,
        label: &str,
    ) -> Vec<BatchResult<T>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
        P: FnMut(BatchProgress),
    {
        let total = items.len();
        let limit = self.concurrency_for(label);
        let interval = std::time::Duration::from_millis(self.config.progress_interval_ms);
        let started = Instant::now();
        debug!(label, total, limit, "batch started");

        let mut slots: Vec<Option<BatchResult<T>>> = std::iter::repeat_with(|| None).take(total).collect();
        let mut done = 0;
        let mut last_report: Option<Instant> = None;

        let worker = &worker;
        let mut completions = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move { (index, worker(item).await) })
            .buffer_unordered(limit);

        while let Some((index, outcome)) = completions.next().await {
            slots[index] = Some(match outcome {
                Ok(value) => BatchResult::Completed(value),
                Err(err) => {
                    debug!(label, index, error = %err, "batch item failed");
                    BatchResult::Failed(err)
                }
            });
            done += 1;
            let due = last_report.is_none_or(|at| at.elapsed() >= interval);
            if due && done < total {
                on_progress(BatchProgress { done, total });
                last_report = Some(Instant::now());
            }
        }
        on_progress(BatchProgress { done, total });

        let results: Vec<BatchResult<T>> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(BatchResult::Failed(DispatchError::Shutdown)))
            .collect();
        let summary = BatchSummary::from_results(&results);
        info!(
            label,
            total,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "batch finished"
        );
        results
    }
}
