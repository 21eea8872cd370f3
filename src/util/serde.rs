//! Shared identifier aliases and the dispatch priority scale.

use serde::{Deserialize, Serialize};

/// Queue-assigned task identifier (monotonic submission sequence).
pub type TaskId = u64;
/// Persisted workflow identifier.
pub type ProcessId = u64;
/// Persisted vote identifier.
pub type VoteId = u64;
/// Persisted punishment identifier.
pub type PunishmentId = u64;
/// Platform user snowflake.
pub type UserId = String;
/// Platform channel snowflake.
pub type ChannelId = String;
/// Platform message snowflake.
pub type MessageId = String;
/// Platform role snowflake.
pub type RoleId = String;

/// Dispatch priority, levels 1 (lowest) to 5 (highest).
///
/// Variants are declared in ascending order so the derived `Ord` matches the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Level 1: anything without a recognised class.
    Unclassified,
    /// Level 2: long-running background jobs (scans, purges).
    Background,
    /// Level 3: end-user commands and ordered interactions.
    EndUser,
    /// Level 4: moderator commands and workflow side effects.
    Moderator,
    /// Level 5: administrative commands.
    Administrative,
}

impl Priority {
    /// Numeric level in `1..=5`.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Unclassified => 1,
            Self::Background => 2,
            Self::EndUser => 3,
            Self::Moderator => 4,
            Self::Administrative => 5,
        }
    }

    /// Parse a numeric level; `None` outside `1..=5`.
    #[must_use]
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Unclassified),
            2 => Some(Self::Background),
            3 => Some(Self::EndUser),
            4 => Some(Self::Moderator),
            5 => Some(Self::Administrative),
            _ => None,
        }
    }

    /// Priority for a slash command, keyed on its name prefix.
    #[must_use]
    pub fn for_command(name: &str) -> Self {
        const PREFIXES: [(&str, Priority); 4] = [
            ("adm_", Priority::Administrative),
            ("mod_", Priority::Moderator),
            ("user_", Priority::EndUser),
            ("long_", Priority::Background),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map_or(Self::Unclassified, |(_, priority)| *priority)
    }

    /// Priority for a component interaction, keyed on the custom id family
    /// (text before the first `_`).
    ///
    /// Returns `None` for families that do not need ordering against commands;
    /// those are handled directly rather than queued.
    #[must_use]
    pub fn for_interaction(custom_id: &str) -> Option<Self> {
        let family = custom_id.split('_').next().unwrap_or_default();
        match family {
            "appeal" => Some(Self::Moderator),
            "court" | "vote" | "support" => Some(Self::EndUser),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level())
    }
}
