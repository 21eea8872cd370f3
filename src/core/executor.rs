//! Execution seams: runtime spawning and the type-erased queued action.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::core::DispatchError;

/// Abstraction for spawning detached work on a runtime.
pub trait Spawn {
    /// Spawn a future that runs to completion in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// How a single attempt of a queued action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The caller received a value.
    Settled,
    /// The caller received an error of this kind.
    Failed(&'static str),
    /// Throttled; the caller has received nothing yet and the action must be retried.
    RateLimited(Option<Duration>),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// A re-invocable, type-erased queued action.
///
/// Invoking it runs the caller's action once and reports the attempt; the
/// caller's result handle is settled from inside the job.
pub type Job = Box<dyn FnMut() -> BoxFuture<'static, Attempt> + Send>;

/// Wrap a caller action into a [`Job`] that reports its outcome on `tx`.
///
/// The action is invoked again for every rate-limited retry, so it must be
/// able to rebuild its future (`FnMut`). A panicking action settles the
/// caller with [`DispatchError::External`] and reports `Failed("panic")`.
pub(crate) fn erase<T, F, Fut>(mut action: F, tx: oneshot::Sender<Result<T, DispatchError>>) -> Job
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(tx)));
    Box::new(move || -> BoxFuture<'static, Attempt> {
        let fut = action();
        let slot = Arc::clone(&slot);
        Box::pin(async move {
            let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let err = DispatchError::External(format!(
                        "queued action panicked: {}",
                        panic_message(payload.as_ref())
                    ));
                    tracing::error!(error = %err, "queued action panicked");
                    let sender = slot.lock().take();
                    if let Some(tx) = sender {
                        let _ = tx.send(Err(err));
                    }
                    return Attempt::Failed("panic");
                }
            };
            match outcome {
                Ok(value) => {
                    let sender = slot.lock().take();
                    if let Some(tx) = sender {
                        let _ = tx.send(Ok(value));
                    }
                    Attempt::Settled
                }
                Err(err) if err.is_rate_limited() => Attempt::RateLimited(err.retry_after()),
                Err(err) => {
                    let kind = err.kind();
                    tracing::warn!(error = %err, kind, "queued action failed");
                    let sender = slot.lock().take();
                    if let Some(tx) = sender {
                        let _ = tx.send(Err(err));
                    }
                    Attempt::Failed(kind)
                }
            }
        })
    })
}
