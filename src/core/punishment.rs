//! Applied bans and mutes.

use serde::{Deserialize, Serialize};

use crate::util::duration::format_duration;
use crate::util::serde::{ProcessId, PunishmentId, UserId};

/// Punishment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishmentType {
    /// Guild ban.
    Ban,
    /// Communication timeout.
    Mute,
}

/// Punishment lifecycle, independent of any appeal referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishmentStatus {
    /// In force.
    Active,
    /// Ran out.
    Expired,
    /// Lifted by a successful appeal.
    Appealed,
    /// Lifted by a moderator.
    Revoked,
}

/// A persisted punishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punishment {
    /// Store-assigned id.
    pub id: PunishmentId,
    /// Punished user.
    pub user_id: UserId,
    /// Kind.
    #[serde(rename = "type")]
    pub kind: PunishmentType,
    /// Lifecycle state.
    pub status: PunishmentStatus,
    /// Stated reason.
    pub reason: String,
    /// Length; `None` is permanent.
    pub duration_ms: Option<u64>,
    /// Optional warning period that follows a mute.
    pub warning_duration_ms: Option<u64>,
    /// Who imposed it.
    pub executor_id: UserId,
    /// Process that imposed it, if any.
    pub process_id: Option<ProcessId>,
    /// Creation time, ms since epoch.
    pub created_at_ms: u64,
}

impl Punishment {
    /// When the punishment lapses, if it is not permanent.
    #[must_use]
    pub fn expires_at_ms(&self) -> Option<u64> {
        self.duration_ms.map(|d| self.created_at_ms.saturating_add(d))
    }

    /// Human-readable length, `Permanent` for open-ended punishments.
    #[must_use]
    pub fn describe_duration(&self) -> String {
        format_duration(self.duration_ms)
    }
}

/// Fields for a new punishment; always created `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPunishment {
    /// Punished user.
    pub user_id: UserId,
    /// Kind.
    pub kind: PunishmentType,
    /// Stated reason.
    pub reason: String,
    /// Length; `None` is permanent.
    pub duration_ms: Option<u64>,
    /// Optional warning period.
    pub warning_duration_ms: Option<u64>,
    /// Who imposed it.
    pub executor_id: UserId,
    /// Imposing process.
    pub process_id: Option<ProcessId>,
    /// Creation time.
    pub created_at_ms: u64,
}
