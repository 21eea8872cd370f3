//! Error types for dispatch, workflow and persistence operations.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the queue, batch executor, scheduler and their collaborators.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The platform throttled the call; transient, requeued rather than failed.
    #[error("rate limited")]
    RateLimited {
        /// Server-provided wait before retrying, if any.
        retry_after_ms: Option<u64>,
    },
    /// Target message/channel/member no longer exists. Permanent per item.
    #[error("external resource unavailable: {0}")]
    ExternalUnavailable(String),
    /// Item was skipped because the operation does not apply to it.
    #[error("not applicable: {0}")]
    NotApplicable(String),
    /// Any other platform failure.
    #[error("external call failed: {0}")]
    External(String),
    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// Queue is at its configured depth.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// The component has been shut down.
    #[error("shut down")]
    Shutdown,
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DispatchError {
    /// Whether this error should be retried after a backoff rather than reported.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Server-provided retry hint for rate-limit errors.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// Whether a batch should count this as skipped instead of failed.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::NotApplicable(_))
    }

    /// Stable short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::ExternalUnavailable(_) => "external_unavailable",
            Self::NotApplicable(_) => "not_applicable",
            Self::External(_) => "external",
            Self::Persistence(_) => "persistence",
            Self::QueueFull(_) => "queue_full",
            Self::Shutdown => "shutdown",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// One-line status suitable for showing to the invoking user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited { .. } | Self::QueueFull(_) => {
                "The bot is busy right now, please try again shortly.".to_string()
            }
            Self::ExternalUnavailable(what) => format!("Could not find {what}."),
            Self::NotApplicable(why) => format!("Nothing to do: {why}."),
            Self::Shutdown => "The bot is restarting, please try again shortly.".to_string(),
            Self::External(_) | Self::Persistence(_) | Self::InvalidConfig(_) => {
                "Something went wrong; moderators have been notified.".to_string()
            }
        }
    }
}

/// Application-facing result using anyhow for startup and configuration contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
