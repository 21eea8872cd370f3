//! Serializable record state shared by every store backend.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::process::{NewProcess, Process, ProcessPatch, ProcessStatus};
use crate::core::punishment::{NewPunishment, Punishment, PunishmentStatus};
use crate::core::store::SupportToggle;
use crate::core::vote::{NewVote, Vote, VoteResult, VoteSide, VoteStatus, VoteToggle};
use crate::core::DispatchError;
use crate::util::serde::{ProcessId, PunishmentId, VoteId};

/// All persisted records plus id sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreState {
    next_process_id: ProcessId,
    next_vote_id: VoteId,
    next_punishment_id: PunishmentId,
    processes: BTreeMap<ProcessId, Process>,
    votes: BTreeMap<VoteId, Vote>,
    punishments: BTreeMap<PunishmentId, Punishment>,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

fn not_found(what: &str, id: u64) -> DispatchError {
    DispatchError::Persistence(format!("{what} {id} not found"))
}

impl StoreState {
    pub(crate) fn create_process(&mut self, fields: NewProcess) -> Result<Process, DispatchError> {
        if fields.expire_at_ms <= fields.created_at_ms {
            return Err(DispatchError::Persistence(
                "process expire_at must be after created_at".into(),
            ));
        }
        let id = next_id(&mut self.next_process_id);
        let process = Process {
            id,
            status: ProcessStatus::Pending,
            target_id: fields.target_id,
            executor_id: fields.executor_id,
            message_id: None,
            expire_at_ms: fields.expire_at_ms,
            created_at_ms: fields.created_at_ms,
            supporters: BTreeSet::new(),
            details: fields.details,
            vote_id: None,
            status_note: None,
        };
        self.processes.insert(id, process.clone());
        Ok(process)
    }

    pub(crate) fn process(&self, id: ProcessId) -> Option<Process> {
        self.processes.get(&id).cloned()
    }

    pub(crate) fn process_by_message(&self, message_id: &str) -> Option<Process> {
        self.processes
            .values()
            .find(|p| p.message_id.as_deref() == Some(message_id))
            .cloned()
    }

    pub(crate) fn processes(&self, active_only: bool) -> Vec<Process> {
        self.processes
            .values()
            .filter(|p| !active_only || !p.is_terminal())
            .cloned()
            .collect()
    }

    pub(crate) fn user_processes(&self, user_id: &str, include_history: bool) -> Vec<Process> {
        self.processes
            .values()
            .filter(|p| p.target_id == user_id || p.executor_id == user_id)
            .filter(|p| include_history || !p.is_terminal())
            .cloned()
            .collect()
    }

    pub(crate) fn update_process_status(
        &mut self,
        id: ProcessId,
        status: ProcessStatus,
        patch: ProcessPatch,
    ) -> Result<Option<Process>, DispatchError> {
        let process = self.processes.get_mut(&id).ok_or_else(|| not_found("process", id))?;
        if !process.status.can_transition_to(status) {
            return Ok(None);
        }
        if let Some(expire_at_ms) = patch.expire_at_ms {
            if expire_at_ms <= process.created_at_ms {
                return Err(DispatchError::Persistence(
                    "process expire_at must be after created_at".into(),
                ));
            }
        }
        process.status = status;
        patch.apply(process);
        Ok(Some(process.clone()))
    }

    pub(crate) fn patch_process(&mut self, id: ProcessId, patch: ProcessPatch) -> Result<Process, DispatchError> {
        let process = self.processes.get_mut(&id).ok_or_else(|| not_found("process", id))?;
        if !process.is_terminal() {
            patch.apply(process);
        }
        Ok(process.clone())
    }

    pub(crate) fn toggle_supporter(
        &mut self,
        id: ProcessId,
        user_id: &str,
        threshold: usize,
    ) -> Result<SupportToggle, DispatchError> {
        let process = self.processes.get_mut(&id).ok_or_else(|| not_found("process", id))?;
        if process.status != ProcessStatus::Pending {
            return Err(DispatchError::NotApplicable(format!(
                "process {id} is {} and no longer accepts support",
                process.status
            )));
        }
        let before = process.supporters.len();
        let added = if process.supporters.remove(user_id) {
            false
        } else {
            process.supporters.insert(user_id.to_string());
            true
        };
        let reached = added && before < threshold && process.supporters.len() >= threshold;
        Ok(SupportToggle {
            process: process.clone(),
            added,
            reached,
        })
    }

    pub(crate) fn create_vote(&mut self, fields: NewVote) -> Result<Vote, DispatchError> {
        if fields.end_ms <= fields.start_ms {
            return Err(DispatchError::Persistence("vote end must be after start".into()));
        }
        let id = next_id(&mut self.next_vote_id);
        let vote = Vote {
            id,
            process_id: fields.process_id,
            process_type: fields.process_type,
            status: VoteStatus::InProgress,
            red_voters: BTreeSet::new(),
            blue_voters: BTreeSet::new(),
            start_ms: fields.start_ms,
            end_ms: fields.end_ms,
            result: None,
        };
        self.votes.insert(id, vote.clone());
        Ok(vote)
    }

    pub(crate) fn vote(&self, id: VoteId) -> Option<Vote> {
        self.votes.get(&id).cloned()
    }

    pub(crate) fn vote_by_process(&self, process_id: ProcessId) -> Option<Vote> {
        self.votes
            .values()
            .rev()
            .find(|v| v.process_id == process_id)
            .cloned()
    }

    pub(crate) fn toggle_voter(
        &mut self,
        id: VoteId,
        user_id: &str,
        side: VoteSide,
        now_ms: u64,
    ) -> Result<(Vote, VoteToggle), DispatchError> {
        let vote = self.votes.get_mut(&id).ok_or_else(|| not_found("vote", id))?;
        if !vote.is_open(now_ms) {
            return Err(DispatchError::NotApplicable(format!("vote {id} is closed")));
        }
        let toggle = vote.toggle(user_id, side);
        Ok((vote.clone(), toggle))
    }

    pub(crate) fn close_vote(&mut self, id: VoteId, result: VoteResult) -> Result<Option<Vote>, DispatchError> {
        let vote = self.votes.get_mut(&id).ok_or_else(|| not_found("vote", id))?;
        if vote.status == VoteStatus::Completed {
            return Ok(None);
        }
        vote.status = VoteStatus::Completed;
        vote.result = Some(result);
        Ok(Some(vote.clone()))
    }

    pub(crate) fn create_punishment(&mut self, fields: NewPunishment) -> Punishment {
        let id = next_id(&mut self.next_punishment_id);
        let punishment = Punishment {
            id,
            user_id: fields.user_id,
            kind: fields.kind,
            status: PunishmentStatus::Active,
            reason: fields.reason,
            duration_ms: fields.duration_ms,
            warning_duration_ms: fields.warning_duration_ms,
            executor_id: fields.executor_id,
            process_id: fields.process_id,
            created_at_ms: fields.created_at_ms,
        };
        self.punishments.insert(id, punishment.clone());
        punishment
    }

    pub(crate) fn punishment(&self, id: PunishmentId) -> Option<Punishment> {
        self.punishments.get(&id).cloned()
    }

    pub(crate) fn user_punishments(&self, user_id: &str, include_history: bool) -> Vec<Punishment> {
        self.punishments
            .values()
            .filter(|p| p.user_id == user_id)
            .filter(|p| include_history || p.status == PunishmentStatus::Active)
            .cloned()
            .collect()
    }

    pub(crate) fn update_punishment_status(
        &mut self,
        id: PunishmentId,
        status: PunishmentStatus,
    ) -> Result<Option<Punishment>, DispatchError> {
        let punishment = self
            .punishments
            .get_mut(&id)
            .ok_or_else(|| not_found("punishment", id))?;
        if punishment.status != PunishmentStatus::Active || status == PunishmentStatus::Active {
            return Ok(None);
        }
        punishment.status = status;
        Ok(Some(punishment.clone()))
    }
}
