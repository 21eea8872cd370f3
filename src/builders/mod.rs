//! Builders to construct the service context from configuration.

pub mod services;

pub use services::Services;
