//! Red/blue votes bound to vote-gated processes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::process::ProcessType;
use crate::util::serde::{ProcessId, UserId, VoteId};

/// Which side a voter backs. Red is in favour of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteSide {
    /// In favour.
    Red,
    /// Against.
    Blue,
}

/// Vote lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    /// Accepting votes.
    InProgress,
    /// Closed with a result.
    Completed,
}

/// Closure outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteResult {
    /// Strict red majority.
    RedWin,
    /// Strict blue majority.
    BlueWin,
    /// Exact tie, including no votes at all.
    Cancelled,
}

/// Majority rule: a strict majority wins, any tie cancels.
#[must_use]
pub const fn tally(red: usize, blue: usize) -> VoteResult {
    if red > blue {
        VoteResult::RedWin
    } else if blue > red {
        VoteResult::BlueWin
    } else {
        VoteResult::Cancelled
    }
}

/// Effect of a single vote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteToggle {
    /// The user joined a side.
    Added,
    /// The user voted the same side again and was removed.
    Withdrawn,
    /// The user moved from the other side.
    Switched,
}

/// A persisted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Store-assigned id.
    pub id: VoteId,
    /// Process this vote decides.
    pub process_id: ProcessId,
    /// Kind of the bound process.
    pub process_type: ProcessType,
    /// Lifecycle state.
    pub status: VoteStatus,
    /// Voters in favour. Disjoint from `blue_voters`.
    pub red_voters: BTreeSet<UserId>,
    /// Voters against.
    pub blue_voters: BTreeSet<UserId>,
    /// Opening time, ms since epoch.
    pub start_ms: u64,
    /// Closing time, ms since epoch.
    pub end_ms: u64,
    /// Set once closed.
    pub result: Option<VoteResult>,
}

impl Vote {
    /// Record `user` voting for `side`.
    ///
    /// Voting the same side twice withdraws; voting the other side switches.
    pub fn toggle(&mut self, user: &str, side: VoteSide) -> VoteToggle {
        let (mine, theirs) = match side {
            VoteSide::Red => (&mut self.red_voters, &mut self.blue_voters),
            VoteSide::Blue => (&mut self.blue_voters, &mut self.red_voters),
        };
        if mine.remove(user) {
            return VoteToggle::Withdrawn;
        }
        let switched = theirs.remove(user);
        mine.insert(user.to_string());
        if switched {
            VoteToggle::Switched
        } else {
            VoteToggle::Added
        }
    }

    /// Result the current voter sets would produce.
    #[must_use]
    pub fn tally(&self) -> VoteResult {
        tally(self.red_voters.len(), self.blue_voters.len())
    }

    /// Whether a vote cast at `now_ms` is accepted.
    #[must_use]
    pub fn is_open(&self, now_ms: u64) -> bool {
        self.status == VoteStatus::InProgress && now_ms < self.end_ms
    }
}

/// Fields for a new vote; always created `InProgress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVote {
    /// Process this vote decides.
    pub process_id: ProcessId,
    /// Kind of the bound process.
    pub process_type: ProcessType,
    /// Opening time.
    pub start_ms: u64,
    /// Closing time.
    pub end_ms: u64,
}
