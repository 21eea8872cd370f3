//! Resolution policy applied when a process timer fires.
//!
//! Every resolution re-reads the process first, and a winning vote re-reads
//! it once more right before the side effect, so a revoke that lands between
//! fire and commit suppresses the effect. Status writes go through the
//! store's terminal-state guard; losing that race is a silent no-op.
//!
//! A decided resolution whose side effect fails still completes the process.
//! The error is kept in the status note and posted to the ops channel.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::executor::Spawn;
use crate::core::platform::Platform;
use crate::core::process::{Process, ProcessDetails, ProcessPatch, ProcessStatus, ProcessType};
use crate::core::punishment::{NewPunishment, PunishmentStatus, PunishmentType};
use crate::core::request_queue::RequestQueue;
use crate::core::scheduler::{TimerHandler, TimerOutcome};
use crate::core::store::Persistence;
use crate::core::vote::{VoteResult, VoteStatus};
use crate::core::DispatchError;
use crate::runtime::TokioSpawner;
use crate::util::clock::now_ms;
use crate::util::serde::{ChannelId, Priority, ProcessId};

/// Message history removed alongside a ban, in seconds.
pub const BAN_MESSAGE_HISTORY_SECS: u64 = 7 * 24 * 60 * 60;

/// What a resolution attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The process no longer exists.
    Missing,
    /// Already terminal when read; nothing done.
    AlreadyTerminal,
    /// Another resolution of the same process is running.
    InFlight,
    /// Support threshold never reached; cancelled.
    Expired,
    /// Debate deadline reached; completed.
    DebateCompleted,
    /// Vote tied; vote and process cancelled.
    Tied,
    /// Vote lost; rejected.
    Rejected,
    /// Vote won and the side effect ran.
    Applied,
    /// Vote won, the side effect failed, the process completed anyway.
    EffectFailed,
    /// Cancelled without a vote result.
    Cancelled,
    /// A concurrent transition won the terminal-state race.
    Superseded,
    /// The deadline moved past the fire time; nothing decided.
    Rescheduled {
        /// The fresh deadline.
        fire_at_ms: u64,
    },
}

struct ResolvingGuard<'a> {
    set: &'a Mutex<HashSet<ProcessId>>,
    id: ProcessId,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// Applies resolution policy and side effects.
pub struct ProcessResolver<S = TokioSpawner> {
    store: Arc<dyn Persistence>,
    platform: Arc<dyn Platform>,
    queue: RequestQueue<S>,
    audit: Arc<dyn AuditSink>,
    ops_channel_id: Option<ChannelId>,
    resolving: Mutex<HashSet<ProcessId>>,
}

impl<S> ProcessResolver<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a resolver.
    pub fn new(
        store: Arc<dyn Persistence>,
        platform: Arc<dyn Platform>,
        queue: RequestQueue<S>,
        audit: Arc<dyn AuditSink>,
        ops_channel_id: Option<ChannelId>,
    ) -> Self {
        Self {
            store,
            platform,
            queue,
            audit,
            ops_channel_id,
            resolving: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve `process_id` according to its current persisted state.
    ///
    /// # Errors
    ///
    /// Persistence failures. Side-effect failures are not errors here; they
    /// produce [`Resolution::EffectFailed`].
    pub async fn resolve(&self, process_id: ProcessId) -> Result<Resolution, DispatchError> {
        self.resolve_inner(process_id, None).await
    }

    /// Resolve `process_id` only if its persisted deadline has passed at
    /// `now_ms`. A deadline that moved later yields
    /// [`Resolution::Rescheduled`] and leaves the process untouched.
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn resolve_due(&self, process_id: ProcessId, now_ms: u64) -> Result<Resolution, DispatchError> {
        self.resolve_inner(process_id, Some(now_ms)).await
    }

    async fn resolve_inner(&self, process_id: ProcessId, due_at: Option<u64>) -> Result<Resolution, DispatchError> {
        let first = self.resolving.lock().insert(process_id);
        if !first {
            debug!(process_id, "resolution already running");
            return Ok(Resolution::InFlight);
        }
        let _guard = ResolvingGuard {
            set: &self.resolving,
            id: process_id,
        };

        let Some(process) = self.store.get_process(process_id).await? else {
            warn!(process_id, "fired process no longer exists");
            return Ok(Resolution::Missing);
        };
        if process.is_terminal() {
            debug!(process_id, status = %process.status, "process already resolved");
            return Ok(Resolution::AlreadyTerminal);
        }
        if let Some(now) = due_at {
            if process.expire_at_ms > now {
                debug!(
                    process_id,
                    status = %process.status,
                    expire_at_ms = process.expire_at_ms,
                    "deadline moved, not resolving"
                );
                return Ok(Resolution::Rescheduled {
                    fire_at_ms: process.expire_at_ms,
                });
            }
        }

        match (process.status, process.process_type()) {
            (ProcessStatus::Pending, _) => {
                self.finish(
                    &process,
                    ProcessStatus::Cancelled,
                    ProcessPatch::note("support threshold not reached"),
                    Resolution::Expired,
                )
                .await
            }
            (_, ProcessType::Debate) => {
                self.finish(
                    &process,
                    ProcessStatus::Completed,
                    ProcessPatch::note("debate deadline reached"),
                    Resolution::DebateCompleted,
                )
                .await
            }
            _ => self.close_vote(&process).await,
        }
    }

    async fn close_vote(&self, process: &Process) -> Result<Resolution, DispatchError> {
        let vote = match process.vote_id {
            Some(vote_id) => self.store.get_vote(vote_id).await?,
            None => None,
        };
        let Some(vote) = vote else {
            warn!(process_id = process.id, "in-progress process has no vote");
            return self
                .finish(
                    process,
                    ProcessStatus::Cancelled,
                    ProcessPatch::note("vote record missing"),
                    Resolution::Cancelled,
                )
                .await;
        };

        let result = match (vote.status, vote.result) {
            (VoteStatus::Completed, Some(result)) => result,
            _ => vote.tally(),
        };
        self.store.close_vote(vote.id, result).await?;
        info!(
            process_id = process.id,
            vote_id = vote.id,
            red = vote.red_voters.len(),
            blue = vote.blue_voters.len(),
            ?result,
            "vote closed"
        );

        match result {
            VoteResult::Cancelled => {
                self.finish(
                    process,
                    ProcessStatus::Cancelled,
                    ProcessPatch::note("vote tied"),
                    Resolution::Tied,
                )
                .await
            }
            VoteResult::BlueWin => {
                self.finish(
                    process,
                    ProcessStatus::Rejected,
                    ProcessPatch::note("vote rejected"),
                    Resolution::Rejected,
                )
                .await
            }
            VoteResult::RedWin => self.apply(process.id).await,
        }
    }

    async fn apply(&self, process_id: ProcessId) -> Result<Resolution, DispatchError> {
        // Re-read: a revoke may have landed after the timer fired.
        let Some(fresh) = self.store.get_process(process_id).await? else {
            return Ok(Resolution::Missing);
        };
        if fresh.is_terminal() {
            info!(process_id, status = %fresh.status, "process resolved concurrently, skipping side effect");
            return Ok(Resolution::Superseded);
        }

        match self.execute_effect(&fresh).await {
            Ok(()) => {
                self.finish(
                    &fresh,
                    ProcessStatus::Completed,
                    ProcessPatch::note("vote passed"),
                    Resolution::Applied,
                )
                .await
            }
            Err(err) => {
                error!(process_id, error = %err, kind = err.kind(), "side effect failed");
                let resolution = self
                    .finish(
                        &fresh,
                        ProcessStatus::Completed,
                        ProcessPatch::note(format!("effect_error: {err}")),
                        Resolution::EffectFailed,
                    )
                    .await?;
                self.audit.record(build_audit_event(
                    process_id,
                    AuditAction::EffectFailed,
                    None,
                    Some(err.to_string()),
                ));
                self.alert(&fresh, &err).await;
                Ok(resolution)
            }
        }
    }

    async fn finish(
        &self,
        process: &Process,
        status: ProcessStatus,
        patch: ProcessPatch,
        resolution: Resolution,
    ) -> Result<Resolution, DispatchError> {
        let note = patch.status_note.clone();
        let Some(updated) = self.store.update_process_status(process.id, status, patch).await? else {
            debug!(process_id = process.id, %status, "transition skipped by terminal guard");
            return Ok(Resolution::Superseded);
        };
        info!(
            process_id = updated.id,
            process_type = %updated.process_type(),
            status = %updated.status,
            ?resolution,
            "process resolved"
        );
        self.audit
            .record(build_audit_event(updated.id, AuditAction::Resolved, None, note));
        Ok(resolution)
    }

    async fn execute_effect(&self, process: &Process) -> Result<(), DispatchError> {
        let target = process.target_id.clone();
        match &process.details {
            ProcessDetails::CourtMute {
                mute_duration_ms,
                warning_duration_ms,
                revoke_role_id,
                reason,
            } => {
                let now = now_ms();
                let until = now.saturating_add(*mute_duration_ms);
                let (user, why) = (target.clone(), reason.clone());
                self.dispatch(move |p| {
                    let (user, why) = (user.clone(), why.clone());
                    async move { p.timeout_member(&user, Some(until), &why).await }
                })
                .await?;
                if let Some(role_id) = revoke_role_id.clone() {
                    let user = target.clone();
                    self.dispatch(move |p| {
                        let (user, role_id) = (user.clone(), role_id.clone());
                        async move { p.remove_role(&user, &role_id).await }
                    })
                    .await?;
                }
                let punishment = self
                    .store
                    .create_punishment(NewPunishment {
                        user_id: target,
                        kind: PunishmentType::Mute,
                        reason: reason.clone(),
                        duration_ms: Some(*mute_duration_ms),
                        warning_duration_ms: *warning_duration_ms,
                        executor_id: process.executor_id.clone(),
                        process_id: Some(process.id),
                        created_at_ms: now,
                    })
                    .await?;
                info!(
                    punishment_id = punishment.id,
                    expires_at_ms = ?punishment.expires_at_ms(),
                    length = %punishment.describe_duration(),
                    "mute recorded"
                );
            }
            ProcessDetails::CourtBan {
                keep_messages,
                reason,
            } => {
                let delete_secs = if *keep_messages { 0 } else { BAN_MESSAGE_HISTORY_SECS };
                let (user, why) = (target.clone(), reason.clone());
                self.dispatch(move |p| {
                    let (user, why) = (user.clone(), why.clone());
                    async move { p.ban_member(&user, &why, delete_secs).await }
                })
                .await?;
                let punishment = self
                    .store
                    .create_punishment(NewPunishment {
                        user_id: target,
                        kind: PunishmentType::Ban,
                        reason: reason.clone(),
                        duration_ms: None,
                        warning_duration_ms: None,
                        executor_id: process.executor_id.clone(),
                        process_id: Some(process.id),
                        created_at_ms: now_ms(),
                    })
                    .await?;
                info!(
                    punishment_id = punishment.id,
                    length = %punishment.describe_duration(),
                    "ban recorded"
                );
            }
            ProcessDetails::Appeal { punishment_id, .. } => {
                let punishment = self
                    .store
                    .get_punishment(*punishment_id)
                    .await?
                    .ok_or_else(|| DispatchError::ExternalUnavailable(format!("punishment {punishment_id}")))?;
                let user = punishment.user_id.clone();
                match punishment.kind {
                    PunishmentType::Ban => {
                        self.dispatch(move |p| {
                            let user = user.clone();
                            async move { p.unban_member(&user, "appeal accepted").await }
                        })
                        .await?;
                    }
                    PunishmentType::Mute => {
                        self.dispatch(move |p| {
                            let user = user.clone();
                            async move { p.timeout_member(&user, None, "appeal accepted").await }
                        })
                        .await?;
                    }
                }
                if self
                    .store
                    .update_punishment_status(*punishment_id, PunishmentStatus::Appealed)
                    .await?
                    .is_none()
                {
                    warn!(punishment_id, "appealed punishment was no longer active");
                }
            }
            ProcessDetails::Debate { .. } => {}
        }
        Ok(())
    }

    async fn alert(&self, process: &Process, err: &DispatchError) {
        let Some(channel) = self.ops_channel_id.clone() else {
            warn!(process_id = process.id, "no ops channel configured for effect failure");
            return;
        };
        let content = format!(
            "Process #{} ({}) against <@{}> completed, but its side effect failed: {err}. Manual follow-up required.",
            process.id,
            process.process_type(),
            process.target_id
        );
        let sent = self
            .dispatch(move |p| {
                let (channel, content) = (channel.clone(), content.clone());
                async move { p.send_message(&channel, &content).await }
            })
            .await;
        if let Err(alert_err) = sent {
            warn!(process_id = process.id, error = %alert_err, "ops alert failed");
        }
    }

    async fn dispatch<T, F, Fut>(&self, action: F) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn Platform>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
    {
        let platform = Arc::clone(&self.platform);
        self.queue
            .enqueue(move || action(Arc::clone(&platform)), Priority::Moderator)
            .await
    }
}

#[async_trait]
impl<S> TimerHandler for ProcessResolver<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    async fn on_fire(&self, process_id: ProcessId) -> TimerOutcome {
        match self.resolve_due(process_id, now_ms()).await {
            Ok(Resolution::Rescheduled { fire_at_ms }) => TimerOutcome::Rearm(fire_at_ms),
            Ok(resolution) => {
                debug!(process_id, ?resolution, "timer handled");
                TimerOutcome::Done
            }
            Err(err) => {
                error!(process_id, error = %err, "process resolution failed");
                TimerOutcome::Done
            }
        }
    }
}
