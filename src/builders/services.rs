//! Process-wide service context, built once at startup and handed to handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::sync::oneshot;
use tracing::info;

use crate::config::CoreConfig;
use crate::core::{
    await_confirmation, AppResult, AuditSink, BatchExecutor, Confirmation, CooldownTracker, CourtService,
    DispatchError, InMemoryAuditSink, Persistence, Platform, ProcessResolver, ProcessScheduler, Purger, RequestQueue,
    RestoreReport, Spawn, TimerHandler,
};
use crate::runtime::{status_report, TokioSpawner};

/// Audit events retained in memory.
pub const AUDIT_CAPACITY: usize = 1_000;

/// Every long-lived service, wired together.
pub struct Services<S = TokioSpawner> {
    /// Validated configuration.
    pub config: CoreConfig,
    /// Global outbound request queue.
    pub queue: RequestQueue<S>,
    /// Fan-out executor.
    pub batch: BatchExecutor,
    /// Channel purges.
    pub purger: Purger<S>,
    /// Timer resolution policy.
    pub resolver: Arc<ProcessResolver<S>>,
    /// Process timers.
    pub scheduler: ProcessScheduler<S>,
    /// Workflow entry points.
    pub court: CourtService<S>,
    /// Command cooldowns.
    pub cooldowns: CooldownTracker,
    /// Workflow audit trail.
    pub audit: Arc<InMemoryAuditSink>,
    /// Record store.
    pub store: Arc<dyn Persistence>,
    started: Instant,
}

impl<S> Services<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Validate `config` and construct every service once.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when validation fails.
    pub fn build(
        config: CoreConfig,
        platform: Arc<dyn Platform>,
        store: Arc<dyn Persistence>,
        spawner: S,
    ) -> Result<Self, DispatchError> {
        config
            .validate()
            .map_err(|e| DispatchError::InvalidConfig(format!("config invalid: {e}")))?;

        let queue = RequestQueue::new(config.queue.clone(), spawner.clone())?;
        let batch = BatchExecutor::new(config.batch.clone());
        let purger = Purger::new(Arc::clone(&platform), queue.clone(), batch.clone(), config.purge.clone());
        let audit = Arc::new(InMemoryAuditSink::new(AUDIT_CAPACITY));
        let audit_sink: Arc<dyn AuditSink> = audit.clone();
        let resolver = Arc::new(ProcessResolver::new(
            Arc::clone(&store),
            platform,
            queue.clone(),
            Arc::clone(&audit_sink),
            config.court.ops_channel_id.clone(),
        ));
        let handler: Arc<dyn TimerHandler> = resolver.clone();
        let scheduler = ProcessScheduler::new(handler, spawner);
        let court = CourtService::new(config.court.clone(), Arc::clone(&store), scheduler.clone(), audit_sink);
        let cooldowns = CooldownTracker::new(config.cooldown.clone());
        info!("services built");

        Ok(Self {
            config,
            queue,
            batch,
            purger,
            resolver,
            scheduler,
            court,
            cooldowns,
            audit,
            store,
            started: Instant::now(),
        })
    }

    /// Reconcile persisted processes. Overdue ones are resolved before this
    /// returns, so call it before accepting commands.
    ///
    /// # Errors
    ///
    /// Persistence failures while listing processes.
    pub async fn start(&self, now_ms: u64) -> Result<RestoreReport, DispatchError> {
        self.scheduler.restore(&*self.store, now_ms).await
    }

    /// Status text for the status command.
    #[must_use]
    pub fn status(&self) -> String {
        status_report(&self.queue, self.started.elapsed())
    }

    /// Fixed window for confirmation prompts.
    #[must_use]
    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.config.court.confirmation_timeout_ms)
    }

    /// Wait for the answer to a confirmation prompt within the configured window.
    pub async fn confirm(&self, answer: oneshot::Receiver<bool>) -> Confirmation {
        await_confirmation(answer, self.confirmation_timeout()).await
    }

    /// Cancel timers and stop the queue.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.queue.shutdown();
        info!("services shut down");
    }
}

impl Services<TokioSpawner> {
    /// Build from `.env`/`TRIBUNAL_CONFIG` on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Configuration loading or validation failures.
    pub fn from_env(platform: Arc<dyn Platform>, store: Arc<dyn Persistence>) -> AppResult<Self> {
        let config = CoreConfig::from_env()?;
        Self::build(config, platform, store, TokioSpawner::current()).context("building services")
    }
}
