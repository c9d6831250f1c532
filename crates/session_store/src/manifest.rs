//! Manifest persistence helpers.
//!
//! The manifest is mutated by exactly one component for exactly one
//! session, so atomic rename is the only locking required.

use std::path::{Path, PathBuf};

use contracts::{CoreError, Manifest};

const MANIFEST_FILE: &str = "manifest.json";

/// Manifest location inside a session directory.
pub fn manifest_path(session_dir: &Path) -> PathBuf {
    session_dir.join(MANIFEST_FILE)
}

/// Read the manifest for a session directory.
pub fn load_manifest(session_dir: &Path) -> Result<Manifest, CoreError> {
    let path = manifest_path(session_dir);
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| CoreError::Other(format!("manifest parse error at {}: {e}", path.display())))
}

/// Atomically replace the manifest for a session directory.
pub fn write_manifest(session_dir: &Path, manifest: &Manifest) -> Result<(), CoreError> {
    integrity::atomic_write_json(&manifest_path(session_dir), manifest)
}
