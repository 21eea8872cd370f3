//! Workflow entry points used by command and button handlers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CourtConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::executor::Spawn;
use crate::core::process::{NewProcess, Process, ProcessDetails, ProcessPatch, ProcessStatus, ProcessType};
use crate::core::scheduler::ProcessScheduler;
use crate::core::store::Persistence;
use crate::core::vote::{NewVote, Vote, VoteResult, VoteSide, VoteToggle};
use crate::core::DispatchError;
use crate::runtime::TokioSpawner;
use crate::util::serde::{ProcessId, UserId, VoteId};

/// A new workflow request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// User the workflow is about.
    pub target_id: UserId,
    /// Submitter.
    pub executor_id: UserId,
    /// Type-specific payload.
    pub details: ProcessDetails,
}

/// What a support toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportOutcome {
    /// Process after the toggle (and any advance).
    pub process: Process,
    /// `true` when support was added, `false` when withdrawn.
    pub added: bool,
    /// Vote opened by this toggle, for vote-gated processes.
    pub opened_vote: Option<Vote>,
}

impl SupportOutcome {
    /// Whether this toggle moved the process out of `Pending`.
    #[must_use]
    pub fn advanced(&self) -> bool {
        self.process.status == ProcessStatus::InProgress
    }
}

/// Submission, support, voting and revocation.
pub struct CourtService<S = TokioSpawner> {
    config: CourtConfig,
    store: Arc<dyn Persistence>,
    scheduler: ProcessScheduler<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S> CourtService<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create the service.
    pub fn new(
        config: CourtConfig,
        store: Arc<dyn Persistence>,
        scheduler: ProcessScheduler<S>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            store,
            scheduler,
            audit,
        }
    }

    /// Supporters needed to advance a pending process.
    #[must_use]
    pub const fn required_supports(&self) -> usize {
        self.config.required_supports
    }

    /// Create a pending process and start its support window.
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn submit(&self, request: SubmitRequest, now_ms: u64) -> Result<Process, DispatchError> {
        let window = match request.details.process_type() {
            ProcessType::Debate => self.config.debate_duration_ms,
            _ => self.config.appeal_duration_ms,
        };
        let process = self
            .store
            .create_process(NewProcess {
                target_id: request.target_id,
                executor_id: request.executor_id,
                expire_at_ms: now_ms.saturating_add(window),
                created_at_ms: now_ms,
                details: request.details,
            })
            .await?;
        self.scheduler.schedule_process(&process);
        info!(
            process_id = process.id,
            process_type = %process.process_type(),
            expire_at_ms = process.expire_at_ms,
            "process submitted"
        );
        self.audit.record(build_audit_event(
            process.id,
            AuditAction::Submitted,
            Some(&process.executor_id),
            None,
        ));
        Ok(process)
    }

    /// Record the announcement message posted for `process_id`.
    ///
    /// # Errors
    ///
    /// Persistence failures, including an unknown id.
    pub async fn attach_message(
        &self,
        process_id: ProcessId,
        message_id: impl Into<String>,
    ) -> Result<Process, DispatchError> {
        let message_id = message_id.into();
        let process = self
            .store
            .patch_process(
                process_id,
                ProcessPatch {
                    message_id: Some(message_id.clone()),
                    ..ProcessPatch::default()
                },
            )
            .await?;
        self.audit.record(build_audit_event(
            process_id,
            AuditAction::MessageAttached,
            None,
            Some(message_id),
        ));
        Ok(process)
    }

    /// Toggle `user_id`'s support on the process announced by `message_id`.
    ///
    /// The threshold is checked synchronously: the toggle that reaches it
    /// starts a debate, or opens the vote for every other type.
    ///
    /// # Errors
    ///
    /// `ExternalUnavailable` for an unknown message, `NotApplicable` once
    /// the process has left `Pending`, or persistence failures.
    pub async fn toggle_support(
        &self,
        message_id: &str,
        user_id: &str,
        now_ms: u64,
    ) -> Result<SupportOutcome, DispatchError> {
        let process = self
            .store
            .get_process_by_message_id(message_id)
            .await?
            .ok_or_else(|| DispatchError::ExternalUnavailable(format!("process for message {message_id}")))?;
        let toggle = self
            .store
            .toggle_supporter(process.id, user_id, self.config.required_supports)
            .await?;
        let action = if toggle.added {
            AuditAction::SupportAdded
        } else {
            AuditAction::SupportWithdrawn
        };
        self.audit
            .record(build_audit_event(process.id, action, Some(user_id), None));
        info!(
            process_id = process.id,
            supporters = toggle.process.support_count(),
            required = self.config.required_supports,
            added = toggle.added,
            "support toggled"
        );

        if !toggle.reached {
            return Ok(SupportOutcome {
                process: toggle.process,
                added: toggle.added,
                opened_vote: None,
            });
        }
        let (process, opened_vote) = self.advance(toggle.process, now_ms).await?;
        Ok(SupportOutcome {
            process,
            added: toggle.added,
            opened_vote,
        })
    }

    async fn advance(&self, process: Process, now_ms: u64) -> Result<(Process, Option<Vote>), DispatchError> {
        if !process.process_type().is_vote_gated() {
            let Some(started) = self
                .store
                .update_process_status(process.id, ProcessStatus::InProgress, ProcessPatch::note("support reached"))
                .await?
            else {
                return Ok((process, None));
            };
            info!(process_id = started.id, "debate started");
            self.audit
                .record(build_audit_event(started.id, AuditAction::DebateStarted, None, None));
            return Ok((started, None));
        }

        let vote = self
            .store
            .create_vote(NewVote {
                process_id: process.id,
                process_type: process.process_type(),
                start_ms: now_ms,
                end_ms: now_ms.saturating_add(self.config.vote_duration_ms),
            })
            .await?;
        let patch = ProcessPatch {
            vote_id: Some(vote.id),
            expire_at_ms: Some(vote.end_ms),
            status_note: Some("support reached".into()),
            ..ProcessPatch::default()
        };
        let Some(started) = self
            .store
            .update_process_status(process.id, ProcessStatus::InProgress, patch)
            .await?
        else {
            // Another toggle advanced it first; discard the spare vote.
            warn!(process_id = process.id, vote_id = vote.id, "process already advanced, closing spare vote");
            self.store.close_vote(vote.id, VoteResult::Cancelled).await?;
            return Ok((process, None));
        };
        self.scheduler.schedule_process(&started);
        info!(
            process_id = started.id,
            vote_id = vote.id,
            end_ms = vote.end_ms,
            "vote opened"
        );
        self.audit.record(build_audit_event(
            started.id,
            AuditAction::VoteOpened,
            None,
            Some(format!("vote {}", vote.id)),
        ));
        Ok((started, Some(vote)))
    }

    /// Toggle `user_id`'s vote for `side`.
    ///
    /// # Errors
    ///
    /// `NotApplicable` once the vote is closed or past its end, or
    /// persistence failures.
    pub async fn toggle_vote(
        &self,
        vote_id: VoteId,
        user_id: &str,
        side: VoteSide,
        now_ms: u64,
    ) -> Result<(Vote, VoteToggle), DispatchError> {
        let (vote, toggle) = self.store.toggle_voter(vote_id, user_id, side, now_ms).await?;
        self.audit.record(build_audit_event(
            vote.process_id,
            AuditAction::VoteCast,
            Some(user_id),
            Some(format!("{side:?} {toggle:?}")),
        ));
        Ok((vote, toggle))
    }

    /// Cancel `process_id` on behalf of its submitter and clear its timer.
    ///
    /// Revoking an already resolved process returns it unchanged.
    ///
    /// # Errors
    ///
    /// `ExternalUnavailable` for an unknown id, `NotApplicable` when
    /// `requester` is not the submitter, or persistence failures.
    pub async fn revoke(&self, process_id: ProcessId, requester: &str) -> Result<Process, DispatchError> {
        let process = self
            .store
            .get_process(process_id)
            .await?
            .ok_or_else(|| DispatchError::ExternalUnavailable(format!("process {process_id}")))?;
        if process.executor_id != requester {
            return Err(DispatchError::NotApplicable(
                "only the submitter can revoke this process".into(),
            ));
        }
        let Some(revoked) = self
            .store
            .update_process_status(process_id, ProcessStatus::Cancelled, ProcessPatch::note("revoked by submitter"))
            .await?
        else {
            return Ok(process);
        };
        self.scheduler.cancel_process(process_id);
        if let Some(vote_id) = revoked.vote_id {
            self.store.close_vote(vote_id, VoteResult::Cancelled).await?;
        }
        info!(process_id, "process revoked");
        self.audit.record(build_audit_event(
            process_id,
            AuditAction::Revoked,
            Some(requester),
            None,
        ));
        Ok(revoked)
    }

    /// Processes involving `user_id`.
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn user_processes(&self, user_id: &str, include_history: bool) -> Result<Vec<Process>, DispatchError> {
        self.store.get_user_processes(user_id, include_history).await
    }
}
