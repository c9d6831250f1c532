//! Shared sync-metadata document persistence.
//!
//! Several components update this document at different points of a
//! session's life (recorder stop, mirror finalize, fusion). Updates go
//! through [`SyncMetadataStore::update`], which always re-reads the latest
//! document before mutating, so a stale in-memory copy can never clobber
//! another writer's fields.

use std::path::{Path, PathBuf};

use tracing::debug;

use contracts::{CoreError, SyncMetadata};

use crate::error::StoreError;

/// Handle to the `sync_metadata.json` document of one session pair.
#[derive(Debug, Clone)]
pub struct SyncMetadataStore {
    path: PathBuf,
}

impl SyncMetadataStore {
    pub const FILE_NAME: &'static str = "sync_metadata.json";

    /// Store rooted at the session-pair directory.
    pub fn new(pair_dir: &Path) -> Self {
        Self {
            path: pair_dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document, if one exists.
    pub fn load(&self) -> Result<Option<SyncMetadata>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let meta = serde_json::from_str(&content).map_err(|e| {
            CoreError::Other(format!(
                "sync metadata parse error at {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(meta))
    }

    fn load_or_new(&self, mission: &str) -> Result<SyncMetadata, StoreError> {
        Ok(self.load()?.unwrap_or_else(|| SyncMetadata::new(mission)))
    }

    /// Read-modify-write one mutation atomically, returning the document
    /// as written.
    pub fn update<F>(&self, mission: &str, mutate: F) -> Result<SyncMetadata, StoreError>
    where
        F: FnOnce(&mut SyncMetadata),
    {
        let mut meta = self.load_or_new(mission)?;
        mutate(&mut meta);
        integrity::atomic_write_json(&self.path, &meta)?;
        debug!(path = %self.path.display(), "Sync metadata updated");
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FusionStatus, SensorRecord, SensorRole, SensorState};

    #[test]
    fn test_load_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SyncMetadataStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_update_preserves_other_writers_fields() {
        let dir = tempfile::tempdir().unwrap();

        // Writer one records the surface sensor's completion
        let store_a = SyncMetadataStore::new(dir.path());
        store_a
            .update("dive-12", |meta| {
                meta.sensors.insert(
                    SensorRole::Surface,
                    SensorRecord {
                        session_id: "s1".into(),
                        state: SensorState::Complete,
                        rows: 10,
                        bytes: 512,
                    },
                );
            })
            .unwrap();

        // Writer two holds its own handle and only touches fusion status
        let store_b = SyncMetadataStore::new(dir.path());
        let meta = store_b
            .update("dive-12", |meta| {
                meta.fusion.status = FusionStatus::Skipped;
            })
            .unwrap();

        assert_eq!(meta.mission, "dive-12");
        assert!(meta.is_complete(SensorRole::Surface));
        assert_eq!(meta.fusion.status, FusionStatus::Skipped);
    }
}
