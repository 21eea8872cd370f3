//! Volatile store for tests and single-run deployments.

use parking_lot::Mutex;

use super::{SnapshotStore, StoreState};
use crate::core::DispatchError;

/// Store holding every record in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemoryStore {
    fn state(&self) -> &Mutex<StoreState> {
        &self.state
    }

    fn persist(&self, _state: &StoreState) -> Result<(), DispatchError> {
        Ok(())
    }
}
