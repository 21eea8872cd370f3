//! Abstract capability set of the chat platform.
//!
//! Implementations map platform failures onto [`DispatchError`]: throttling
//! to `RateLimited`, missing objects to `ExternalUnavailable`, everything
//! else to `External`. Role, ban and timeout operations must be idempotent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::DispatchError;
use crate::util::serde::{ChannelId, MessageId, RoleId, UserId};

/// Minimal message view needed by purges and announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Message snowflake.
    pub id: MessageId,
    /// Channel the message lives in.
    pub channel_id: ChannelId,
    /// Author snowflake.
    pub author_id: UserId,
    /// Creation time, ms since epoch.
    pub created_at_ms: u64,
}

/// History page request. `before` and `after` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    /// Page size, at most 100.
    pub limit: usize,
    /// Return messages older than this id.
    pub before: Option<MessageId>,
    /// Return messages newer than this id.
    pub after: Option<MessageId>,
}

impl MessageQuery {
    /// Page of messages older than `id`.
    #[must_use]
    pub fn before(id: impl Into<MessageId>, limit: usize) -> Self {
        Self {
            limit,
            before: Some(id.into()),
            after: None,
        }
    }
}

/// Guild member view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// User snowflake.
    pub user_id: UserId,
    /// Roles currently held.
    pub role_ids: Vec<RoleId>,
    /// Whether the member has administrator permission.
    pub is_administrator: bool,
}

impl Member {
    /// Whether the member holds `role_id`.
    #[must_use]
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|r| r == role_id)
    }
}

/// Outbound platform operations. Every call is expected to go through the
/// request queue.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Post a message, returning its id.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<MessageId, DispatchError>;

    /// Fetch a page of channel history, newest first.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<MessageRef>, DispatchError>;

    /// Delete one message.
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), DispatchError>;

    /// Delete up to 100 messages younger than the bulk-delete horizon.
    /// Returns how many were deleted. Callers pre-filter by age.
    async fn bulk_delete_messages(
        &self,
        channel_id: &str,
        message_ids: &[MessageId],
    ) -> Result<usize, DispatchError>;

    /// Replace a message's content.
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), DispatchError>;

    /// Grant a role.
    async fn add_role(&self, user_id: &str, role_id: &str) -> Result<(), DispatchError>;

    /// Revoke a role.
    async fn remove_role(&self, user_id: &str, role_id: &str) -> Result<(), DispatchError>;

    /// Look up a guild member.
    async fn fetch_member(&self, user_id: &str) -> Result<Member, DispatchError>;

    /// Ban a user, optionally deleting their recent messages.
    async fn ban_member(
        &self,
        user_id: &str,
        reason: &str,
        delete_message_seconds: u64,
    ) -> Result<(), DispatchError>;

    /// Lift a ban.
    async fn unban_member(&self, user_id: &str, reason: &str) -> Result<(), DispatchError>;

    /// Time a member out until `until_ms`, or clear the timeout with `None`.
    async fn timeout_member(
        &self,
        user_id: &str,
        until_ms: Option<u64>,
        reason: &str,
    ) -> Result<(), DispatchError>;
}
