//! Shared utilities: clock, identifiers and priorities, durations, telemetry.

pub mod clock;
pub mod duration;
pub mod serde;
pub mod telemetry;

pub use self::clock::*;
pub use self::duration::*;
pub use self::serde::*;
pub use self::telemetry::*;
