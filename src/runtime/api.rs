//! Handler-facing entry points and status models.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{DispatchError, QueueStats, RequestQueue, Spawn};
use crate::util::duration::format_duration;
use crate::util::serde::Priority;

/// Status payload for a status command or health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Queue counters.
    pub queue: QueueStats,
    /// Time since startup.
    pub uptime_ms: u64,
}

impl StatusSnapshot {
    /// Capture the queue's counters now.
    pub fn capture<S>(queue: &RequestQueue<S>, uptime: Duration) -> Self
    where
        S: Spawn + Clone + Send + Sync + 'static,
    {
        Self {
            queue: queue.stats(),
            uptime_ms: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Run a slash command's action through the queue at its command-class priority.
///
/// # Errors
///
/// Queue admission errors or the action's own error.
pub async fn submit_command<S, T, F, Fut>(queue: &RequestQueue<S>, command: &str, action: F) -> Result<T, DispatchError>
where
    S: Spawn + Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
{
    let priority = Priority::for_command(command);
    debug!(command, %priority, "command routed");
    queue.enqueue(action, priority).await
}

/// Run a component interaction's action. Families that must stay ordered
/// against commands go through the queue; the rest run directly.
///
/// # Errors
///
/// Queue admission errors or the action's own error.
pub async fn route_interaction<S, T, F, Fut>(
    queue: &RequestQueue<S>,
    custom_id: &str,
    mut action: F,
) -> Result<T, DispatchError>
where
    S: Spawn + Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
{
    match Priority::for_interaction(custom_id) {
        Some(priority) => {
            debug!(custom_id, %priority, "interaction queued");
            queue.enqueue(action, priority).await
        }
        None => {
            debug!(custom_id, "interaction handled directly");
            action().await
        }
    }
}

/// Render the queue counters as a short multi-line report.
pub fn status_report<S>(queue: &RequestQueue<S>, uptime: Duration) -> String
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    render_status(&StatusSnapshot::capture(queue, uptime))
}

/// Render a captured snapshot.
#[must_use]
pub fn render_status(snapshot: &StatusSnapshot) -> String {
    let q = &snapshot.queue;
    let mut lines = vec![
        format!("Uptime: {}", format_duration(Some(snapshot.uptime_ms))),
        format!("Queue: {} pending, {} in flight", q.pending, q.in_flight),
        format!("Processed: {} | Failed: {}", q.processed, q.failed),
    ];
    if q.rate_limited > 0 || q.backing_off > 0 {
        lines.push(format!(
            "Rate limited: {} ({} backing off)",
            q.rate_limited, q.backing_off
        ));
    }
    if q.paused {
        lines.push("Queue is paused".to_string());
    }
    lines.join("\n")
}
