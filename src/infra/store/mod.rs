//! Store backends.
//!
//! Backends only decide where [`StoreState`] lives and how it is persisted;
//! the record rules live in the state engine and are shared.

pub mod file;
pub mod memory;
pub mod state;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::process::{NewProcess, Process, ProcessPatch, ProcessStatus};
use crate::core::punishment::{NewPunishment, Punishment, PunishmentStatus};
use crate::core::store::{ProcessStore, PunishmentStore, SupportToggle, VoteStore};
use crate::core::vote::{NewVote, Vote, VoteResult, VoteSide, VoteToggle};
use crate::core::DispatchError;
use crate::util::serde::{ProcessId, PunishmentId, VoteId};

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use state::StoreState;

/// A backend holding [`StoreState`] behind a lock.
pub trait SnapshotStore: Send + Sync {
    /// The guarded state.
    fn state(&self) -> &Mutex<StoreState>;

    /// Make `state` durable. Called after every mutation, with the lock held.
    ///
    /// # Errors
    ///
    /// `Persistence` when the write fails.
    fn persist(&self, state: &StoreState) -> Result<(), DispatchError>;

    /// Run a read-only query against the state.
    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state().lock())
    }

    /// Run a mutation and persist the result in the same critical section.
    ///
    /// # Errors
    ///
    /// The mutation's own error, or a persistence failure.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> Result<R, DispatchError>) -> Result<R, DispatchError> {
        let mut state = self.state().lock();
        let out = f(&mut state)?;
        self.persist(&state)?;
        Ok(out)
    }
}

#[async_trait]
impl<S: SnapshotStore> ProcessStore for S {
    async fn create_process(&self, fields: NewProcess) -> Result<Process, DispatchError> {
        self.mutate(|s| s.create_process(fields))
    }

    async fn get_process(&self, id: ProcessId) -> Result<Option<Process>, DispatchError> {
        Ok(self.read(|s| s.process(id)))
    }

    async fn get_process_by_message_id(&self, message_id: &str) -> Result<Option<Process>, DispatchError> {
        Ok(self.read(|s| s.process_by_message(message_id)))
    }

    async fn get_all_processes(&self, active_only: bool) -> Result<Vec<Process>, DispatchError> {
        Ok(self.read(|s| s.processes(active_only)))
    }

    async fn get_user_processes(
        &self,
        user_id: &str,
        include_history: bool,
    ) -> Result<Vec<Process>, DispatchError> {
        Ok(self.read(|s| s.user_processes(user_id, include_history)))
    }

    async fn update_process_status(
        &self,
        id: ProcessId,
        status: ProcessStatus,
        patch: ProcessPatch,
    ) -> Result<Option<Process>, DispatchError> {
        self.mutate(|s| s.update_process_status(id, status, patch))
    }

    async fn patch_process(&self, id: ProcessId, patch: ProcessPatch) -> Result<Process, DispatchError> {
        self.mutate(|s| s.patch_process(id, patch))
    }

    async fn toggle_supporter(
        &self,
        id: ProcessId,
        user_id: &str,
        threshold: usize,
    ) -> Result<SupportToggle, DispatchError> {
        self.mutate(|s| s.toggle_supporter(id, user_id, threshold))
    }
}

#[async_trait]
impl<S: SnapshotStore> VoteStore for S {
    async fn create_vote(&self, fields: NewVote) -> Result<Vote, DispatchError> {
        self.mutate(|s| s.create_vote(fields))
    }

    async fn get_vote(&self, id: VoteId) -> Result<Option<Vote>, DispatchError> {
        Ok(self.read(|s| s.vote(id)))
    }

    async fn get_vote_by_process(&self, process_id: ProcessId) -> Result<Option<Vote>, DispatchError> {
        Ok(self.read(|s| s.vote_by_process(process_id)))
    }

    async fn toggle_voter(
        &self,
        id: VoteId,
        user_id: &str,
        side: VoteSide,
        now_ms: u64,
    ) -> Result<(Vote, VoteToggle), DispatchError> {
        self.mutate(|s| s.toggle_voter(id, user_id, side, now_ms))
    }

    async fn close_vote(&self, id: VoteId, result: VoteResult) -> Result<Option<Vote>, DispatchError> {
        self.mutate(|s| s.close_vote(id, result))
    }
}

#[async_trait]
impl<S: SnapshotStore> PunishmentStore for S {
    async fn create_punishment(&self, fields: NewPunishment) -> Result<Punishment, DispatchError> {
        self.mutate(|s| Ok(s.create_punishment(fields)))
    }

    async fn get_punishment(&self, id: PunishmentId) -> Result<Option<Punishment>, DispatchError> {
        Ok(self.read(|s| s.punishment(id)))
    }

    async fn get_user_punishments(
        &self,
        user_id: &str,
        include_history: bool,
    ) -> Result<Vec<Punishment>, DispatchError> {
        Ok(self.read(|s| s.user_punishments(user_id, include_history)))
    }

    async fn update_punishment_status(
        &self,
        id: PunishmentId,
        status: PunishmentStatus,
    ) -> Result<Option<Punishment>, DispatchError> {
        self.mutate(|s| s.update_punishment_status(id, status))
    }
}
