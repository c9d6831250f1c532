//! # Integrity
//!
//! Content hashing and atomic file replacement.
//!
//! Every persistent-state writer in the system (manifest, mirror progress,
//! sync metadata, session files, unified output) goes through
//! [`atomic_write`] so a reader never observes a partial file. Hashes are
//! recomputed on every call, never cached across writes.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};

use contracts::CoreError;

const HASH_BUF_SIZE: usize = 64 * 1024;

/// SHA-256 of a whole file, lowercase hex.
pub fn hash_file(path: &Path) -> Result<String, CoreError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BUF_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `bytes` to a sibling temp path, then rename over `path`.
///
/// The temp name carries a nanosecond suffix so concurrent writers to
/// different targets in the same directory cannot collide.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    let tmp_path = sibling_temp_path(path);

    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(bytes)?;
    tmp.sync_all()?;
    drop(tmp);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::Other(format!("json serialize error: {e}")))?;
    atomic_write(path, &json)
}

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("atomic");
    path.with_file_name(format!(".{name}.tmp.{nanos}"))
}
