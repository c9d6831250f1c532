//! Chunk and manifest records - ChunkedSessionStore on-disk index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final on-disk name for a chunk by index (`chunk_00042.csv`).
pub fn chunk_file_name(index: u64) -> String {
    format!("chunk_{index:05}.csv")
}

/// Temp name of a chunk still being appended to.
pub fn open_chunk_file_name(index: u64) -> String {
    format!("{}.tmp", chunk_file_name(index))
}

/// Session file name for a session id.
pub fn session_file_name(session_id: &str) -> String {
    format!("session_{session_id}.csv")
}

/// One finalized, immutable chunk as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Monotonic index within the session
    pub index: u64,

    /// File name relative to the session directory
    pub name: String,

    /// Reading rows in the chunk (header excluded, markers included)
    pub row_count: u64,

    /// SHA-256 of the finalized file, lowercase hex
    pub sha256: String,

    /// File size in bytes
    pub size_bytes: u64,

    /// When the chunk was finalized
    pub timestamp: DateTime<Utc>,
}

/// Per-session index of finalized chunks plus running totals.
///
/// Updated transactionally (read whole, mutate, atomic write) after each
/// chunk finalization; prior chunk entries are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub session_id: String,
    pub sensor_id: String,
    pub mission: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,

    /// Running total of reading rows across finalized chunks
    pub total_rows: u64,

    /// Running total of finalized chunk bytes
    pub total_bytes: u64,

    /// SHA-256 of the combined session file, set at session stop
    pub session_sha256: Option<String>,

    /// Ordered list of finalized chunks
    pub chunks: Vec<ChunkMetadata>,
}

impl Manifest {
    pub fn new(
        session_id: impl Into<String>,
        sensor_id: impl Into<String>,
        mission: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sensor_id: sensor_id.into(),
            mission: mission.into(),
            started_at,
            stopped_at: None,
            total_rows: 0,
            total_bytes: 0,
            session_sha256: None,
            chunks: Vec::new(),
        }
    }

    /// Index the next finalized chunk will take.
    pub fn next_index(&self) -> u64 {
        self.chunks.last().map(|c| c.index + 1).unwrap_or(0)
    }

    /// Append a finalized chunk and bump the running totals.
    pub fn push_chunk(&mut self, chunk: ChunkMetadata) {
        self.total_rows += chunk.row_count;
        self.total_bytes += chunk.size_bytes;
        self.chunks.push(chunk);
    }
}

/// One advertised chunk in the remote peer's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub index: u64,
    pub name: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Resumable cursor for a replication run.
///
/// Persisted beside the mirrored chunks so a restarted agent resumes
/// instead of re-downloading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorProgress {
    /// Highest chunk index verified and renamed into place
    pub last_chunk_index: Option<u64>,

    /// Total verified bytes mirrored so far
    pub bytes_mirrored: u64,

    /// Wall-clock time of the last successful poll
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl MirrorProgress {
    /// Whether a catalog entry is new relative to this cursor.
    pub fn wants(&self, index: u64) -> bool {
        match self.last_chunk_index {
            Some(last) => index > last,
            None => true,
        }
    }
}
