//! Combine step - concatenate finalized chunks into one session file.
//!
//! Shared by the local recorder and the replication mirror; both sides end
//! a session by running the same combine/verify/cleanup sequence.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, instrument, warn};

use contracts::{session_file_name, Manifest};

use crate::csv::{count_reading_rows, CSV_HEADER};
use crate::error::StoreError;
use crate::manifest::write_manifest;

/// Result of combining a session's chunks.
#[derive(Debug, Clone)]
pub struct CombineOutcome {
    /// Path of the combined session file
    pub session_file: PathBuf,

    /// Reading rows in the session file
    pub rows: u64,

    /// Session file size in bytes
    pub bytes: u64,

    /// Whether the row count matched the manifest running total
    pub verified: bool,
}

/// Combine all finalized chunks in index order into one session file,
/// record its hash in the manifest, and verify the row count.
///
/// Each chunk's own header is skipped; a single header is written first.
/// Chunk files are deleted only after verification succeeds; on mismatch
/// they are kept for manual recovery and the outcome is marked unverified.
#[instrument(
    name = "combine_session",
    skip(session_dir, manifest),
    fields(session_id = %manifest.session_id, chunks = manifest.chunks.len())
)]
pub fn combine_session(
    session_dir: &Path,
    manifest: &mut Manifest,
) -> Result<CombineOutcome, StoreError> {
    let session_file = session_dir.join(session_file_name(&manifest.session_id));

    let mut combined = String::with_capacity((manifest.total_bytes as usize).max(CSV_HEADER.len()));
    combined.push_str(CSV_HEADER);
    combined.push('\n');

    for chunk in &manifest.chunks {
        let chunk_path = session_dir.join(&chunk.name);
        let content = std::fs::read_to_string(&chunk_path)?;
        for line in content.lines() {
            if line.is_empty() || line == CSV_HEADER {
                continue;
            }
            combined.push_str(line);
            combined.push('\n');
        }
    }

    integrity::atomic_write(&session_file, combined.as_bytes())?;

    let sha256 = integrity::hash_file(&session_file)?;
    let bytes = std::fs::metadata(&session_file)?.len();
    manifest.session_sha256 = Some(sha256);
    manifest.stopped_at = Some(Utc::now());
    write_manifest(session_dir, manifest)?;

    let rows = count_reading_rows(&session_file)?;
    let verified = rows == manifest.total_rows;

    if verified {
        for chunk in &manifest.chunks {
            let chunk_path = session_dir.join(&chunk.name);
            if let Err(e) = std::fs::remove_file(&chunk_path) {
                warn!(chunk = %chunk.name, error = %e, "Failed to delete combined chunk");
            }
        }
        info!(
            session_id = %manifest.session_id,
            rows,
            bytes,
            "Session file combined and verified"
        );
        metrics::counter!("store_sessions_combined_total", "status" => "verified").increment(1);
    } else {
        warn!(
            session_id = %manifest.session_id,
            manifest_rows = manifest.total_rows,
            file_rows = rows,
            "Row count mismatch; keeping chunk files for manual recovery"
        );
        metrics::counter!("store_sessions_combined_total", "status" => "degraded").increment(1);
    }

    Ok(CombineOutcome {
        session_file,
        rows,
        bytes,
        verified,
    })
}
