//! Queue, batch, purge, court and cooldown configuration structures.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::batch::{
    LABEL_MEMBER_FETCH, LABEL_MEMBER_REMOVE, LABEL_MESSAGE_DELETE, LABEL_MESSAGE_SCAN, LABEL_THREAD_CHECK,
};
use crate::core::error::AppResult;
use crate::util::serde::ChannelId;

/// Environment variable naming a JSON config file.
pub const CONFIG_PATH_ENV: &str = "TRIBUNAL_CONFIG";

const DAY_MS: u64 = 24 * 60 * 60 * 1_000;

/// Request queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum simultaneously in-flight external calls.
    pub max_in_flight: usize,
    /// Maximum pending tasks before rejection.
    pub max_queue_depth: usize,
    /// Base backoff after a rate-limited attempt.
    pub rate_limit_backoff_ms: u64,
    /// Upper bound on the exponential backoff.
    pub max_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            max_queue_depth: 5_000,
            rate_limit_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl QueueConfig {
    /// Validate queue configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_in_flight == 0 {
            return Err("max_in_flight must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.max_backoff_ms < self.rate_limit_backoff_ms {
            return Err("max_backoff_ms must be at least rate_limit_backoff_ms".into());
        }
        Ok(())
    }
}

/// Batch executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrency for labels without an explicit entry.
    pub default_concurrency: usize,
    /// Per-label concurrency bounds.
    pub labels: HashMap<String, usize>,
    /// Minimum spacing between progress callbacks.
    pub progress_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let labels = [
            (LABEL_THREAD_CHECK, 10),
            (LABEL_MESSAGE_SCAN, 10),
            (LABEL_MEMBER_FETCH, 5),
            (LABEL_MEMBER_REMOVE, 3),
            (LABEL_MESSAGE_DELETE, 1),
        ]
        .into_iter()
        .map(|(label, limit)| (label.to_string(), limit))
        .collect();
        Self {
            default_concurrency: 5,
            labels,
            progress_interval_ms: 1_000,
        }
    }
}

impl BatchConfig {
    /// Concurrency bound for a label.
    #[must_use]
    pub fn concurrency_for(&self, label: &str) -> usize {
        self.labels
            .get(label)
            .copied()
            .unwrap_or(self.default_concurrency)
            .max(1)
    }

    /// Validate batch configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_concurrency == 0 {
            return Err("default_concurrency must be greater than 0".into());
        }
        if let Some((label, _)) = self.labels.iter().find(|(_, limit)| **limit == 0) {
            return Err(format!("label `{label}` concurrency must be greater than 0"));
        }
        Ok(())
    }
}

/// Message purge pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    /// Age beyond which messages must be deleted one by one.
    pub bulk_delete_horizon_ms: u64,
    /// Individual deletions per sub-chunk.
    pub chunk_size: usize,
    /// Delay after each individual deletion.
    pub item_delay_ms: u64,
    /// Delay between sub-chunks.
    pub chunk_delay_ms: u64,
    /// Messages requested per history page (platform maximum is 100).
    pub fetch_page_size: usize,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            bulk_delete_horizon_ms: 14 * DAY_MS,
            chunk_size: 10,
            item_delay_ms: 200,
            chunk_delay_ms: 2_000,
            fetch_page_size: 100,
        }
    }
}

impl PurgeConfig {
    /// Validate purge configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.bulk_delete_horizon_ms == 0 {
            return Err("bulk_delete_horizon_ms must be greater than 0".into());
        }
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".into());
        }
        if self.fetch_page_size == 0 || self.fetch_page_size > 100 {
            return Err("fetch_page_size must be within 1..=100".into());
        }
        Ok(())
    }
}

/// Governance workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtConfig {
    /// Supporters needed to advance a pending process.
    pub required_supports: usize,
    /// Support window for appeals and court requests.
    pub appeal_duration_ms: u64,
    /// Support window for debates.
    pub debate_duration_ms: u64,
    /// Voting window once support is reached.
    pub vote_duration_ms: u64,
    /// Channel receiving side-effect failures for human follow-up.
    pub ops_channel_id: Option<ChannelId>,
    /// Fixed timeout for confirmation prompts.
    pub confirmation_timeout_ms: u64,
}

impl Default for CourtConfig {
    fn default() -> Self {
        Self {
            required_supports: 20,
            appeal_duration_ms: DAY_MS,
            debate_duration_ms: 2 * DAY_MS,
            vote_duration_ms: DAY_MS,
            ops_channel_id: None,
            confirmation_timeout_ms: 300_000,
        }
    }
}

impl CourtConfig {
    /// Validate court configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.required_supports == 0 {
            return Err("required_supports must be greater than 0".into());
        }
        for (name, value) in [
            ("appeal_duration_ms", self.appeal_duration_ms),
            ("debate_duration_ms", self.debate_duration_ms),
            ("vote_duration_ms", self.vote_duration_ms),
            ("confirmation_timeout_ms", self.confirmation_timeout_ms),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// Per-command cooldown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Cooldown for commands without an override.
    pub default_secs: u64,
    /// Overrides keyed by command name.
    pub per_command: HashMap<String, u64>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default_secs: 5,
            per_command: HashMap::new(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Request queue settings.
    pub queue: QueueConfig,
    /// Batch executor settings.
    pub batch: BatchConfig,
    /// Purge pacing settings.
    pub purge: PurgeConfig,
    /// Workflow settings.
    pub court: CourtConfig,
    /// Command cooldowns.
    pub cooldown: CooldownConfig,
}

impl CoreConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.queue.validate().map_err(|e| format!("queue invalid: {e}"))?;
        self.batch.validate().map_err(|e| format!("batch invalid: {e}"))?;
        self.purge.validate().map_err(|e| format!("purge invalid: {e}"))?;
        self.court.validate().map_err(|e| format!("court invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, parsed, or validated.
    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading config {}", path.display()))
    }

    /// Load `.env`, then read the file named by `TRIBUNAL_CONFIG`, falling
    /// back to defaults when the variable is unset.
    ///
    /// # Errors
    ///
    /// Fails when the named file cannot be loaded.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_path(path),
            Err(_) => {
                tracing::info!("{CONFIG_PATH_ENV} not set, using default configuration");
                Ok(Self::default())
            }
        }
    }
}
