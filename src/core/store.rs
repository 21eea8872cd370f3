//! Record-shaped persistence contracts for processes, votes and punishments.
//!
//! Status updates use read-then-write with a terminal-state guard: an update
//! attempted on a record that can no longer make that transition returns
//! `Ok(None)` instead of an error. Toggles are atomic read-modify-writes, so
//! concurrent toggles compose in arrival order.

use async_trait::async_trait;

use crate::core::process::{NewProcess, Process, ProcessPatch, ProcessStatus};
use crate::core::punishment::{NewPunishment, Punishment, PunishmentStatus};
use crate::core::vote::{NewVote, Vote, VoteResult, VoteSide, VoteToggle};
use crate::core::DispatchError;
use crate::util::serde::{ProcessId, PunishmentId, VoteId};

/// Result of toggling a supporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportToggle {
    /// Process after the toggle.
    pub process: Process,
    /// `true` when support was added, `false` when withdrawn.
    pub added: bool,
    /// `true` when this toggle took the count from below `threshold` to at least it.
    pub reached: bool,
}

/// Process persistence.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    /// Insert a new `Pending` process.
    ///
    /// # Errors
    ///
    /// `Persistence` when `expire_at_ms <= created_at_ms` or the write fails.
    async fn create_process(&self, fields: NewProcess) -> Result<Process, DispatchError>;

    /// Fetch one process.
    async fn get_process(&self, id: ProcessId) -> Result<Option<Process>, DispatchError>;

    /// Fetch the process announced by `message_id`.
    async fn get_process_by_message_id(&self, message_id: &str) -> Result<Option<Process>, DispatchError>;

    /// All processes, or only non-terminal ones.
    async fn get_all_processes(&self, active_only: bool) -> Result<Vec<Process>, DispatchError>;

    /// Processes targeting or submitted by `user_id`, optionally including terminal ones.
    async fn get_user_processes(
        &self,
        user_id: &str,
        include_history: bool,
    ) -> Result<Vec<Process>, DispatchError>;

    /// Transition `id` to `status`, applying `patch` in the same write.
    ///
    /// Returns `Ok(None)` when the transition is not allowed from the
    /// current status.
    async fn update_process_status(
        &self,
        id: ProcessId,
        status: ProcessStatus,
        patch: ProcessPatch,
    ) -> Result<Option<Process>, DispatchError>;

    /// Apply `patch` without a status change. Terminal processes are left
    /// untouched and returned as-is.
    async fn patch_process(&self, id: ProcessId, patch: ProcessPatch) -> Result<Process, DispatchError>;

    /// Add `user_id` to the supporters, or remove them if already present.
    ///
    /// # Errors
    ///
    /// `NotApplicable` unless the process is `Pending`.
    async fn toggle_supporter(
        &self,
        id: ProcessId,
        user_id: &str,
        threshold: usize,
    ) -> Result<SupportToggle, DispatchError>;
}

/// Vote persistence.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Insert a new `InProgress` vote.
    async fn create_vote(&self, fields: NewVote) -> Result<Vote, DispatchError>;

    /// Fetch one vote.
    async fn get_vote(&self, id: VoteId) -> Result<Option<Vote>, DispatchError>;

    /// Latest vote bound to a process.
    async fn get_vote_by_process(&self, process_id: ProcessId) -> Result<Option<Vote>, DispatchError>;

    /// Record a vote; see [`Vote::toggle`].
    ///
    /// # Errors
    ///
    /// `NotApplicable` once the vote is closed or `now_ms` is past its end.
    async fn toggle_voter(
        &self,
        id: VoteId,
        user_id: &str,
        side: VoteSide,
        now_ms: u64,
    ) -> Result<(Vote, VoteToggle), DispatchError>;

    /// Close the vote with `result`. `Ok(None)` if it was already closed.
    async fn close_vote(&self, id: VoteId, result: VoteResult) -> Result<Option<Vote>, DispatchError>;
}

/// Punishment persistence.
#[async_trait]
pub trait PunishmentStore: Send + Sync {
    /// Insert a new `Active` punishment.
    async fn create_punishment(&self, fields: NewPunishment) -> Result<Punishment, DispatchError>;

    /// Fetch one punishment.
    async fn get_punishment(&self, id: PunishmentId) -> Result<Option<Punishment>, DispatchError>;

    /// Punishments for a user, optionally including lifted ones.
    async fn get_user_punishments(
        &self,
        user_id: &str,
        include_history: bool,
    ) -> Result<Vec<Punishment>, DispatchError>;

    /// Move an `Active` punishment to `status`. `Ok(None)` if it was not active.
    async fn update_punishment_status(
        &self,
        id: PunishmentId,
        status: PunishmentStatus,
    ) -> Result<Option<Punishment>, DispatchError>;
}

/// Everything the workflow needs from storage.
pub trait Persistence: ProcessStore + VoteStore + PunishmentStore {}

impl<T: ProcessStore + VoteStore + PunishmentStore> Persistence for T {}
