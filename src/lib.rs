//! # Tribunal
//!
//! Concurrency and scheduling substrate for a community moderation bot.
//!
//! The crate throttles every outbound call to the chat platform through one
//! priority queue, fans out large scans and purges under bounded concurrency,
//! and drives long-lived governance workflows (appeals, court mutes and bans,
//! debates) whose timers survive restarts.
//!
//! ## Components
//!
//! - **[`RequestQueue`](crate::core::RequestQueue)**: caps in-flight platform calls,
//!   drains highest priority first and FIFO within a priority, and requeues
//!   rate-limited calls with backoff instead of failing them.
//! - **[`BatchExecutor`](crate::core::BatchExecutor)**: runs a worker over many items
//!   with a per-label concurrency bound; results keep input order.
//! - **[`Purger`](crate::core::Purger)**: bulk-deletes young messages in one queued
//!   call and paces individual deletion of older ones.
//! - **[`ProcessScheduler`](crate::core::ProcessScheduler)**: one cancellable timer
//!   per live process, reconciled against the store at startup.
//! - **[`ProcessResolver`](crate::core::ProcessResolver)** and
//!   **[`CourtService`](crate::core::CourtService)**: the workflow state machine,
//!   support thresholds, vote tallies and side effects.
//!
//! ## Wiring
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tribunal::builders::Services;
//! use tribunal::config::CoreConfig;
//! use tribunal::infra::FileStore;
//! use tribunal::runtime::TokioSpawner;
//! use tribunal::util::{init_tracing, now_ms};
//!
//! init_tracing();
//! let store = Arc::new(FileStore::open("data/tribunal.json")?);
//! let services = Services::build(CoreConfig::from_env()?, platform, store, TokioSpawner::current())?;
//! services.start(now_ms()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct the service context from configuration.
pub mod builders;
/// Configuration models for the queue, batches, purges and workflows.
pub mod config;
/// Dispatch, fan-out and workflow scheduling.
pub mod core;
/// Infrastructure adapters for the pending-task heap and record stores.
pub mod infra;
/// Runtime adapters and the handler-facing API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
