//! Short-lived confirmation windows for destructive commands.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

/// How a confirmation window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// The user confirmed.
    Confirmed,
    /// The user declined.
    Declined,
    /// No answer in time, or the responder went away.
    Expired,
}

impl Confirmation {
    /// Whether the guarded action may run.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Wait up to `timeout` for a yes/no answer on `answer`.
pub async fn await_confirmation(answer: oneshot::Receiver<bool>, timeout: Duration) -> Confirmation {
    let outcome = match tokio::time::timeout(timeout, answer).await {
        Ok(Ok(true)) => Confirmation::Confirmed,
        Ok(Ok(false)) => Confirmation::Declined,
        Ok(Err(_)) | Err(_) => Confirmation::Expired,
    };
    debug!(?outcome, "confirmation window closed");
    outcome
}

/// Run `action` only if the window is confirmed. Returns the window outcome
/// and the action's output when it ran.
pub async fn confirm_then<T, Fut>(
    answer: oneshot::Receiver<bool>,
    timeout: Duration,
    action: impl FnOnce() -> Fut,
) -> (Confirmation, Option<T>)
where
    Fut: Future<Output = T>,
{
    let outcome = await_confirmation(answer, timeout).await;
    if outcome.is_confirmed() {
        (outcome, Some(action().await))
    } else {
        (outcome, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answers_resolve_window() {
        let (tx, rx) = oneshot::channel();
        tx.send(true).unwrap();
        assert_eq!(await_confirmation(rx, Duration::from_secs(1)).await, Confirmation::Confirmed);

        let (tx, rx) = oneshot::channel();
        tx.send(false).unwrap();
        assert_eq!(await_confirmation(rx, Duration::from_secs(1)).await, Confirmation::Declined);
    }

    #[tokio::test]
    async fn test_dropped_responder_expires() {
        let (tx, rx) = oneshot::channel::<bool>();
        drop(tx);
        assert_eq!(await_confirmation(rx, Duration::from_secs(1)).await, Confirmation::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_skips_action() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let (_tx, rx) = oneshot::channel::<bool>();
        let flag = AtomicBool::new(false);
        let ran = &flag;
        let (outcome, value) = confirm_then(rx, Duration::from_secs(300), || async move {
            ran.store(true, Ordering::SeqCst);
        })
        .await;
        assert_eq!(outcome, Confirmation::Expired);
        assert!(value.is_none());
        assert!(!flag.load(Ordering::SeqCst));
    }
}
