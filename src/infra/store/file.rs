//! File-backed store using a JSON snapshot.
//!
//! The whole state is rewritten after every mutation: serialized to a
//! sibling temp file, flushed, then renamed over the snapshot so a crash
//! mid-write never leaves a torn file behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{SnapshotStore, StoreState};
use crate::core::DispatchError;

fn backend(err: impl std::fmt::Display) -> DispatchError {
    DispatchError::Persistence(err.to_string())
}

/// Durable store surviving process restarts.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open the snapshot at `path`, creating parent directories as needed.
    /// A missing file starts an empty store.
    ///
    /// # Errors
    ///
    /// `Persistence` when the directory cannot be created or the snapshot
    /// cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(backend)?;
        }
        let state = if path.exists() {
            let raw = fs::read(&path).map_err(backend)?;
            serde_json::from_slice(&raw).map_err(backend)?
        } else {
            StoreState::default()
        };
        info!(path = %path.display(), "file store opened");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Snapshot location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for FileStore {
    fn state(&self) -> &Mutex<StoreState> {
        &self.state
    }

    fn persist(&self, state: &StoreState) -> Result<(), DispatchError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(backend)?;
        let tmp = self.temp_path();
        let mut file = File::create(&tmp).map_err(backend)?;
        file.write_all(&bytes).map_err(backend)?;
        file.sync_all().map_err(backend)?;
        fs::rename(&tmp, &self.path).map_err(backend)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }
}
