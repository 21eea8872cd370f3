//! Persisted governance workflow records and their state machine.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::serde::{MessageId, ProcessId, PunishmentId, RoleId, UserId, VoteId};

/// Workflow kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    /// Appeal against an existing punishment.
    Appeal,
    /// Support-gated legislative debate.
    Debate,
    /// Senator-submitted mute request.
    CourtMute,
    /// Senator-submitted ban request.
    CourtBan,
}

impl ProcessType {
    /// Stable snake_case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Appeal => "appeal",
            Self::Debate => "debate",
            Self::CourtMute => "court_mute",
            Self::CourtBan => "court_ban",
        }
    }

    /// Whether reaching the support threshold opens a vote.
    #[must_use]
    pub const fn is_vote_gated(self) -> bool {
        !matches!(self, Self::Debate)
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status. `Completed`, `Rejected` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Collecting support.
    Pending,
    /// Debate running, or vote open.
    InProgress,
    /// Resolved in favour.
    Completed,
    /// Resolved against.
    Rejected,
    /// Withdrawn, expired, or tied.
    Cancelled,
}

impl ProcessStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::InProgress | Self::Cancelled),
            Self::InProgress => matches!(next, Self::Completed | Self::Rejected | Self::Cancelled),
            Self::Completed | Self::Rejected | Self::Cancelled => false,
        }
    }

    /// Stable snake_case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload. The variant determines the [`ProcessType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessDetails {
    /// Appeal against a punishment.
    Appeal {
        /// Punishment being appealed.
        punishment_id: PunishmentId,
        /// Appellant's statement.
        appeal_content: String,
    },
    /// Legislative debate.
    Debate {
        /// Motion title.
        title: String,
        /// Why the motion is raised.
        reason: String,
        /// Proposed motion text.
        motion: String,
        /// How it would be implemented.
        implementation: String,
        /// Requested voting window, free text.
        vote_time: String,
    },
    /// Mute request.
    CourtMute {
        /// Mute length.
        mute_duration_ms: u64,
        /// Optional warning period recorded with the punishment.
        warning_duration_ms: Option<u64>,
        /// Role removed from the target when the mute lands.
        revoke_role_id: Option<RoleId>,
        /// Stated reason.
        reason: String,
    },
    /// Ban request.
    CourtBan {
        /// Skip deleting the target's recent messages.
        keep_messages: bool,
        /// Stated reason.
        reason: String,
    },
}

impl ProcessDetails {
    /// Workflow kind implied by the payload.
    #[must_use]
    pub const fn process_type(&self) -> ProcessType {
        match self {
            Self::Appeal { .. } => ProcessType::Appeal,
            Self::Debate { .. } => ProcessType::Debate,
            Self::CourtMute { .. } => ProcessType::CourtMute,
            Self::CourtBan { .. } => ProcessType::CourtBan,
        }
    }
}

/// A persisted workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Store-assigned id.
    pub id: ProcessId,
    /// Current status.
    pub status: ProcessStatus,
    /// User the workflow is about.
    pub target_id: UserId,
    /// Submitter; the only user allowed to revoke.
    pub executor_id: UserId,
    /// Announcement message carrying the support button.
    pub message_id: Option<MessageId>,
    /// When the timer fires, ms since epoch.
    pub expire_at_ms: u64,
    /// Creation time, ms since epoch.
    pub created_at_ms: u64,
    /// Users endorsing the workflow.
    pub supporters: BTreeSet<UserId>,
    /// Type-specific payload.
    pub details: ProcessDetails,
    /// Bound vote once support is reached.
    pub vote_id: Option<VoteId>,
    /// Free-form note on the last transition.
    pub status_note: Option<String>,
}

impl Process {
    /// Workflow kind.
    #[must_use]
    pub const fn process_type(&self) -> ProcessType {
        self.details.process_type()
    }

    /// Whether the workflow has resolved.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Current supporter count.
    #[must_use]
    pub fn support_count(&self) -> usize {
        self.supporters.len()
    }
}

/// Fields for a new process; always created `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProcess {
    /// User the workflow is about.
    pub target_id: UserId,
    /// Submitter.
    pub executor_id: UserId,
    /// Timer deadline.
    pub expire_at_ms: u64,
    /// Creation time.
    pub created_at_ms: u64,
    /// Type-specific payload.
    pub details: ProcessDetails,
}

/// Optional field updates applied alongside a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessPatch {
    /// New announcement message.
    pub message_id: Option<MessageId>,
    /// New timer deadline.
    pub expire_at_ms: Option<u64>,
    /// Bound vote.
    pub vote_id: Option<VoteId>,
    /// Note on this transition.
    pub status_note: Option<String>,
}

impl ProcessPatch {
    /// Patch carrying only a status note.
    #[must_use]
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            status_note: Some(note.into()),
            ..Self::default()
        }
    }

    /// Apply every set field to `process`.
    pub fn apply(self, process: &mut Process) {
        if let Some(message_id) = self.message_id {
            process.message_id = Some(message_id);
        }
        if let Some(expire_at_ms) = self.expire_at_ms {
            process.expire_at_ms = expire_at_ms;
        }
        if let Some(vote_id) = self.vote_id {
            process.vote_id = Some(vote_id);
        }
        if let Some(note) = self.status_note {
            process.status_note = Some(note);
        }
    }
}
