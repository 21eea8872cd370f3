//! Configuration models for the queue, batch executor, purge pacing and workflows.

pub mod settings;

pub use settings::{
    BatchConfig, CooldownConfig, CoreConfig, CourtConfig, PurgeConfig, QueueConfig,
    CONFIG_PATH_ENV,
};
