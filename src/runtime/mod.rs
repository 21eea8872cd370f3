//! Runtime adapters and the handler-facing API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{render_status, route_interaction, status_report, submit_command, StatusSnapshot};
pub use tokio_spawner::TokioSpawner;
