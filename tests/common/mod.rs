//! Shared fixtures: a scriptable in-memory platform and a test spawner.

#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tribunal::config::CoreConfig;
use tribunal::core::{DispatchError, Member, MessageQuery, MessageRef, Platform, Spawn};
use tribunal::util::serde::MessageId;

pub const DAY_MS: u64 = 24 * 60 * 60 * 1_000;

// Simple tokio spawner for tests
#[derive(Clone)]
pub struct TestSpawner;

impl Spawn for TestSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { channel: String, content: String },
    Fetch { channel: String, before: Option<String> },
    Delete { id: String },
    BulkDelete { count: usize },
    Edit { id: String },
    AddRole { user: String, role: String },
    RemoveRole { user: String, role: String },
    Ban { user: String, delete_secs: u64 },
    Unban { user: String },
    Timeout { user: String, until_ms: Option<u64> },
}

/// Platform double recording every call.
#[derive(Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    history: Mutex<Vec<MessageRef>>,
    fail_bulk: AtomicBool,
    failing_users: Mutex<HashSet<String>>,
    next_message: AtomicUsize,
    call_delay_ms: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn set_history(&self, messages: Vec<MessageRef>) {
        *self.history.lock() = messages;
    }

    pub fn fail_bulk_deletes(&self) {
        self.fail_bulk.store(true, Ordering::SeqCst);
    }

    pub fn fail_actions_on(&self, user: &str) {
        self.failing_users.lock().insert(user.to_string());
    }

    pub fn set_call_delay(&self, ms: usize) {
        self.call_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push(call);
        let delay = self.call_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check_user(&self, user: &str) -> Result<(), DispatchError> {
        if self.failing_users.lock().contains(user) {
            return Err(DispatchError::External(format!("missing permissions for {user}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<MessageId, DispatchError> {
        self.enter(Call::Send {
            channel: channel_id.into(),
            content: content.into(),
        })
        .await;
        let n = self.next_message.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("msg-{n}"))
    }

    async fn fetch_messages(&self, channel_id: &str, query: MessageQuery) -> Result<Vec<MessageRef>, DispatchError> {
        self.enter(Call::Fetch {
            channel: channel_id.into(),
            before: query.before.clone(),
        })
        .await;
        let before: u64 = query
            .before
            .as_deref()
            .and_then(|id| id.parse().ok())
            .unwrap_or(u64::MAX);
        let mut page: Vec<MessageRef> = self
            .history
            .lock()
            .iter()
            .filter(|m| m.id.parse::<u64>().map_or(false, |id| id < before))
            .cloned()
            .collect();
        page.sort_by_key(|m| std::cmp::Reverse(m.id.parse::<u64>().unwrap_or(0)));
        page.truncate(query.limit);
        Ok(page)
    }

    async fn delete_message(&self, _channel_id: &str, message_id: &str) -> Result<(), DispatchError> {
        self.enter(Call::Delete { id: message_id.into() }).await;
        Ok(())
    }

    async fn bulk_delete_messages(&self, _channel_id: &str, message_ids: &[MessageId]) -> Result<usize, DispatchError> {
        self.enter(Call::BulkDelete {
            count: message_ids.len(),
        })
        .await;
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(DispatchError::External("bulk delete rejected".into()));
        }
        Ok(message_ids.len())
    }

    async fn edit_message(&self, _channel_id: &str, message_id: &str, _content: &str) -> Result<(), DispatchError> {
        self.enter(Call::Edit { id: message_id.into() }).await;
        Ok(())
    }

    async fn add_role(&self, user_id: &str, role_id: &str) -> Result<(), DispatchError> {
        self.enter(Call::AddRole {
            user: user_id.into(),
            role: role_id.into(),
        })
        .await;
        self.check_user(user_id)
    }

    async fn remove_role(&self, user_id: &str, role_id: &str) -> Result<(), DispatchError> {
        self.enter(Call::RemoveRole {
            user: user_id.into(),
            role: role_id.into(),
        })
        .await;
        self.check_user(user_id)
    }

    async fn fetch_member(&self, user_id: &str) -> Result<Member, DispatchError> {
        Ok(Member {
            user_id: user_id.into(),
            role_ids: Vec::new(),
            is_administrator: false,
        })
    }

    async fn ban_member(&self, user_id: &str, _reason: &str, delete_message_seconds: u64) -> Result<(), DispatchError> {
        self.enter(Call::Ban {
            user: user_id.into(),
            delete_secs: delete_message_seconds,
        })
        .await;
        self.check_user(user_id)
    }

    async fn unban_member(&self, user_id: &str, _reason: &str) -> Result<(), DispatchError> {
        self.enter(Call::Unban { user: user_id.into() }).await;
        self.check_user(user_id)
    }

    async fn timeout_member(&self, user_id: &str, until_ms: Option<u64>, _reason: &str) -> Result<(), DispatchError> {
        self.enter(Call::Timeout {
            user: user_id.into(),
            until_ms,
        })
        .await;
        self.check_user(user_id)
    }
}

/// Configuration with small thresholds and no purge pacing.
pub fn test_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.court.required_supports = 3;
    config.court.ops_channel_id = Some("ops".into());
    config.purge.item_delay_ms = 0;
    config.purge.chunk_delay_ms = 0;
    config.queue.rate_limit_backoff_ms = 5;
    config.queue.max_backoff_ms = 20;
    config
}

pub fn message(id: u64, created_at_ms: u64) -> MessageRef {
    MessageRef {
        id: id.to_string(),
        channel_id: "general".into(),
        author_id: "someone".into(),
        created_at_ms,
    }
}
