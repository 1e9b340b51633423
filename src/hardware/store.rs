//! File-backed non-volatile store

use crate::hardware::traits::NonVolatileStore;
use anyhow::{Context, Result};
use fieldcam_shared::{PersistedRecord, StoreKey};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

/// Persisted record kept in one file
///
/// Writes go to a sibling temp file that is then renamed over the live one,
/// so a reset mid-write leaves either the old image or the new one.
pub struct FileStore {
    path: PathBuf,
    record: PersistedRecord,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let record = match fs::read(&path) {
            Ok(bytes) => PersistedRecord::from_bytes(&bytes).unwrap_or_else(|e| {
                warn!("[STORE] {} is corrupt ({}), starting fresh", path.display(), e);
                PersistedRecord::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => PersistedRecord::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        Ok(Self { path, record })
    }

    fn write(&self, record: &PersistedRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, record.to_bytes())
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to commit {}", self.path.display()))
    }
}

impl NonVolatileStore for FileStore {
    fn get(&self, key: StoreKey) -> Result<u64> {
        Ok(self.record.get(key))
    }

    fn set(&mut self, key: StoreKey, value: u64) -> Result<()> {
        let mut next = self.record.clone();
        next.set(key, value);
        self.write(&next)?;
        self.record = next;
        Ok(())
    }
}
