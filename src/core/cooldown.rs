//! Per-command, per-user cooldowns.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::CooldownConfig;

/// Tracks the last accepted use of each (command, user) pair.
pub struct CooldownTracker {
    config: CooldownConfig,
    last_used: Mutex<HashMap<(String, String), u64>>,
}

impl CooldownTracker {
    /// Create a tracker.
    #[must_use]
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Cooldown applied to `command`.
    #[must_use]
    pub fn cooldown_for(&self, command: &str) -> Duration {
        let secs = self
            .config
            .per_command
            .get(command)
            .copied()
            .unwrap_or(self.config.default_secs);
        Duration::from_secs(secs)
    }

    /// Record a use at `now_ms`, or return the remaining wait if still cooling down.
    ///
    /// # Errors
    ///
    /// The remaining cooldown when the previous use is too recent.
    pub fn check(&self, command: &str, user_id: &str, now_ms: u64) -> Result<(), Duration> {
        let window_ms = u64::try_from(self.cooldown_for(command).as_millis()).unwrap_or(u64::MAX);
        let key = (command.to_string(), user_id.to_string());
        let mut last_used = self.last_used.lock();
        if let Some(&at) = last_used.get(&key) {
            let ready_at = at.saturating_add(window_ms);
            if now_ms < ready_at {
                return Err(Duration::from_millis(ready_at - now_ms));
            }
        }
        last_used.insert(key, now_ms);
        Ok(())
    }

    /// Forget entries whose cooldown has lapsed. Returns how many were removed.
    pub fn prune(&self, now_ms: u64) -> usize {
        let mut last_used = self.last_used.lock();
        let before = last_used.len();
        let per_command = &self.config.per_command;
        let default_secs = self.config.default_secs;
        last_used.retain(|(command, _), at| {
            let secs = per_command.get(command).copied().unwrap_or(default_secs);
            at.saturating_add(secs.saturating_mul(1_000)) > now_ms
        });
        before - last_used.len()
    }
}
