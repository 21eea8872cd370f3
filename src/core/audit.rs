//! Audit trail for workflow transitions.
//!
//! Provides the sink abstraction and a bounded in-memory implementation.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::serde::{ProcessId, UserId};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Process created.
    Submitted,
    /// Announcement message attached.
    MessageAttached,
    /// Support added.
    SupportAdded,
    /// Support withdrawn.
    SupportWithdrawn,
    /// Threshold reached on a debate.
    DebateStarted,
    /// Threshold reached; vote opened.
    VoteOpened,
    /// A voter toggled.
    VoteCast,
    /// Submitter revoked the process.
    Revoked,
    /// Timer resolved the process.
    Resolved,
    /// Side effect failed after a decided resolution.
    EffectFailed,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Submitted => "submitted",
            Self::MessageAttached => "message_attached",
            Self::SupportAdded => "support_added",
            Self::SupportWithdrawn => "support_withdrawn",
            Self::DebateStarted => "debate_started",
            Self::VoteOpened => "vote_opened",
            Self::VoteCast => "vote_cast",
            Self::Revoked => "revoked",
            Self::Resolved => "resolved",
            Self::EffectFailed => "effect_failed",
        };
        f.write_str(label)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier (uuid v4).
    pub event_id: String,
    /// Related process.
    pub process_id: ProcessId,
    /// Action taken.
    pub action: AuditAction,
    /// User that caused it; `None` for timer-driven events.
    pub actor: Option<UserId>,
    /// Timestamp milliseconds.
    pub created_at_ms: u64,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink keeping the most recent events.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events for one process, oldest first.
    #[must_use]
    pub fn events_for(&self, process_id: ProcessId) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.process_id == process_id)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event stamped with a fresh id and the current time.
pub fn build_audit_event(
    process_id: ProcessId,
    action: AuditAction,
    actor: Option<&str>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        process_id,
        action,
        actor: actor.map(str::to_string),
        created_at_ms: now_ms(),
        detail,
    }
}
