//! Deferred-task scheduler: one cancellable timer per live process.
//!
//! The registry maps a process id to its timer entry. Each entry owns the
//! sending half of a cancel channel, so replacing or removing an entry
//! cancels the timer it described. A fired timer carries only the process
//! id; the handler re-reads fresh state from the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::core::executor::Spawn;
use crate::core::process::Process;
use crate::core::store::ProcessStore;
use crate::core::DispatchError;
use crate::runtime::TokioSpawner;
use crate::util::clock::{now_ms, until};
use crate::util::serde::ProcessId;

/// What the scheduler should do after a timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The timer is spent.
    Done,
    /// The persisted deadline moved; fire again at this time unless a
    /// newer timer was registered meanwhile.
    Rearm(u64),
}

/// Invoked when a process timer fires.
#[async_trait]
pub trait TimerHandler: Send + Sync {
    /// Resolve the process. Implementations re-read state before acting.
    async fn on_fire(&self, process_id: ProcessId) -> TimerOutcome;
}

struct TimerEntry {
    fire_at_ms: u64,
    generation: u64,
    // Held only to be dropped: dropping it wakes the timer's cancel branch.
    _cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct Registry {
    timers: Mutex<HashMap<ProcessId, TimerEntry>>,
    next_generation: AtomicU64,
}

/// Outcome of startup reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Overdue processes resolved immediately.
    pub resolved: usize,
    /// Processes given a fresh timer.
    pub scheduled: usize,
}

/// Registry of per-process timers.
pub struct ProcessScheduler<S = TokioSpawner> {
    registry: Arc<Registry>,
    handler: Arc<dyn TimerHandler>,
    spawner: S,
}

impl<S: Clone> Clone for ProcessScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handler: Arc::clone(&self.handler),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> ProcessScheduler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create an empty scheduler dispatching fired timers to `handler`.
    pub fn new(handler: Arc<dyn TimerHandler>, spawner: S) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            handler,
            spawner,
        }
    }

    /// Register the timer for `process`, replacing any existing one.
    /// Terminal processes only have their timer cleared.
    pub fn schedule_process(&self, process: &Process) {
        if process.is_terminal() {
            self.cancel_process(process.id);
            return;
        }
        self.schedule_at(process.id, process.expire_at_ms, now_ms(), true);
    }

    fn schedule_at(&self, process_id: ProcessId, fire_at_ms: u64, now_ms: u64, replace: bool) {
        let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let replaced = {
            let mut timers = self.registry.timers.lock();
            let occupied = timers.contains_key(&process_id);
            if occupied && !replace {
                debug!(process_id, fire_at_ms, "newer timer registered, rearm dropped");
                return;
            }
            timers.insert(
                process_id,
                TimerEntry {
                    fire_at_ms,
                    generation,
                    _cancel: cancel_tx,
                },
            );
            occupied
        };
        let delay = until(fire_at_ms, now_ms);
        debug!(
            process_id,
            fire_at_ms,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            replaced,
            "process timer scheduled"
        );

        let scheduler = self.clone();
        self.spawner.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = cancel_rx => return,
            }
            {
                let mut timers = scheduler.registry.timers.lock();
                match timers.get(&process_id) {
                    Some(entry) if entry.generation == generation => {
                        timers.remove(&process_id);
                    }
                    _ => return,
                }
            }
            info!(process_id, "process timer fired");
            if let TimerOutcome::Rearm(at) = scheduler.handler.on_fire(process_id).await {
                scheduler.schedule_at(process_id, at, crate::util::clock::now_ms(), false);
            }
        });
    }

    /// Clear the timer for `process_id`. Returns whether one existed.
    pub fn cancel_process(&self, process_id: ProcessId) -> bool {
        let removed = self.registry.timers.lock().remove(&process_id).is_some();
        if removed {
            debug!(process_id, "process timer cancelled");
        }
        removed
    }

    /// Number of live timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.registry.timers.lock().len()
    }

    /// When the timer for `process_id` fires, if one is registered.
    #[must_use]
    pub fn fire_at(&self, process_id: ProcessId) -> Option<u64> {
        self.registry
            .timers
            .lock()
            .get(&process_id)
            .map(|entry| entry.fire_at_ms)
    }

    /// Cancel every timer.
    pub fn shutdown(&self) {
        let cleared = {
            let mut timers = self.registry.timers.lock();
            let n = timers.len();
            timers.clear();
            n
        };
        info!(cleared, "process scheduler shut down");
    }

    /// Reconcile persisted processes after a restart.
    ///
    /// Overdue processes are resolved one at a time, oldest deadline first,
    /// before this returns. The rest get a fresh timer.
    ///
    /// # Errors
    ///
    /// A persistence error while listing processes.
    pub async fn restore<P>(&self, store: &P, now_ms: u64) -> Result<RestoreReport, DispatchError>
    where
        P: ProcessStore + ?Sized,
    {
        let mut active = store.get_all_processes(true).await?;
        active.sort_by_key(|p| (p.expire_at_ms, p.id));

        let mut report = RestoreReport::default();
        for process in active {
            if process.expire_at_ms <= now_ms {
                debug!(process_id = process.id, "resolving overdue process");
                match self.handler.on_fire(process.id).await {
                    TimerOutcome::Done => report.resolved += 1,
                    TimerOutcome::Rearm(at) => {
                        self.schedule_at(process.id, at, now_ms, false);
                        report.scheduled += 1;
                    }
                }
            } else {
                self.schedule_at(process.id, process.expire_at_ms, now_ms, true);
                report.scheduled += 1;
            }
        }
        info!(
            resolved = report.resolved,
            scheduled = report.scheduled,
            "process timers restored"
        );
        Ok(report)
    }
}
