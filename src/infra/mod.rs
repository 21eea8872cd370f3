//! Infrastructure adapters: the pending-task heap and store backends.

pub mod queue;
pub mod store;

pub use queue::InMemoryQueue;
pub use store::{FileStore, InMemoryStore, SnapshotStore, StoreState};
