//! ChunkedSessionStore - rolling chunk recorder for one session.
//!
//! Each session is owned by a dedicated worker task; readings arrive over a
//! command channel and the flush/roll timers are ticks inside the worker's
//! select loop. Stop is a command too, so the finalize/combine sequence can
//! never interleave with a flush.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    chunk_file_name, open_chunk_file_name, ChunkMetadata, Manifest, Reading, RecordingConfig,
};

use crate::combine::combine_session;
use crate::csv::{count_reading_rows, render_row, CSV_HEADER};
use crate::error::StoreError;
use crate::manifest::write_manifest;

const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Store tuning for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Buffer flush cadence
    pub flush_interval: Duration,

    /// Chunk roll window, measured from the moment a chunk is opened
    pub roll_interval: Duration,

    /// Buffered readings that force an out-of-cycle flush
    pub buffer_ceiling: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&RecordingConfig::default())
    }
}

impl From<&RecordingConfig> for SessionConfig {
    fn from(config: &RecordingConfig) -> Self {
        Self {
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            roll_interval: Duration::from_secs(config.roll_interval_secs),
            buffer_ceiling: config.buffer_ceiling,
        }
    }
}

/// Final counts reported when a session stops.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,

    /// Reading rows in the combined session file
    pub rows: u64,

    /// Session file size in bytes
    pub bytes: u64,

    pub session_file: PathBuf,

    /// False when row-count verification failed (chunks kept on disk)
    pub verified: bool,
}

enum SessionCommand {
    Reading(Reading),
    Stop {
        marker: Option<Reading>,
        ack: oneshot::Sender<Result<SessionSummary, StoreError>>,
    },
}

/// Handle to a running session worker.
pub struct SessionHandle {
    session_id: String,
    sensor_id: String,
    dir: PathBuf,
    tx: mpsc::Sender<SessionCommand>,
    worker: JoinHandle<()>,
}

impl SessionHandle {
    /// Session id (`<mission>_<sensor>_<timestamp>`).
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Sensor this session records.
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Session directory (chunks + manifest + session file).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue one reading for the next flush.
    pub async fn add_reading(&self, reading: Reading) -> Result<(), StoreError> {
        self.tx
            .send(SessionCommand::Reading(reading))
            .await
            .map_err(|_| StoreError::session_closed(&self.session_id))
    }

    /// Stop the session: cancel timers, inject the stop marker (if any) as
    /// the final reading, flush, finalize, combine and verify.
    #[instrument(name = "session_stop", skip(self, stop_marker), fields(session_id = %self.session_id))]
    pub async fn stop(self, stop_marker: Option<Reading>) -> Result<SessionSummary, StoreError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Stop {
                marker: stop_marker,
                ack: ack_tx,
            })
            .await
            .map_err(|_| StoreError::session_closed(&self.session_id))?;

        let result = ack_rx
            .await
            .map_err(|_| StoreError::session_closed(&self.session_id))?;

        if let Err(e) = self.worker.await {
            error!(session_id = %self.session_id, error = ?e, "Session worker panicked");
        }
        result
    }
}

/// Start a new recording session under `parent_dir`.
///
/// Creates the session directory, writes the initial manifest and spawns
/// the worker task.
#[instrument(name = "start_session", skip(parent_dir, config))]
pub async fn start_session(
    parent_dir: &Path,
    sensor_id: &str,
    mission: &str,
    config: SessionConfig,
) -> Result<SessionHandle, StoreError> {
    let session_id = format!(
        "{mission}_{sensor_id}_{}",
        Utc::now().format("%Y%m%d%H%M%S")
    );
    let dir = parent_dir.join(&session_id);
    std::fs::create_dir_all(&dir)?;

    let manifest = Manifest::new(&session_id, sensor_id, mission, Utc::now());
    write_manifest(&dir, &manifest)?;

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let session = ActiveSession {
        session_id: session_id.clone(),
        dir: dir.clone(),
        manifest,
        buffer: Vec::new(),
        open_chunk: None,
        config,
    };
    let worker = tokio::spawn(session_worker(session, rx));

    info!(session_id = %session_id, dir = %dir.display(), "Session started");

    Ok(SessionHandle {
        session_id,
        sensor_id: sensor_id.to_string(),
        dir,
        tx,
        worker,
    })
}

struct OpenChunk {
    index: u64,
    path: PathBuf,
    opened_at: Instant,
    rows: u64,
}

struct ActiveSession {
    session_id: String,
    dir: PathBuf,
    manifest: Manifest,
    buffer: Vec<Reading>,
    open_chunk: Option<OpenChunk>,
    config: SessionConfig,
}

async fn session_worker(mut session: ActiveSession, mut rx: mpsc::Receiver<SessionCommand>) {
    let mut ticker = tokio::time::interval(session.config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(SessionCommand::Reading(reading)) => {
                    session.buffer.push(reading);
                    if session.buffer.len() >= session.config.buffer_ceiling {
                        debug!(
                            session_id = %session.session_id,
                            buffered = session.buffer.len(),
                            "Buffer ceiling reached, flushing out of cycle"
                        );
                        if let Err(e) = session.flush() {
                            error!(session_id = %session.session_id, error = %e, "Flush failed");
                        }
                    }
                }
                Some(SessionCommand::Stop { marker, ack }) => {
                    let _ = ack.send(session.stop(marker));
                    break;
                }
                None => {
                    warn!(session_id = %session.session_id, "Handle dropped without stop; finalizing");
                    if let Err(e) = session.stop(None) {
                        error!(session_id = %session.session_id, error = %e, "Implicit stop failed");
                    }
                    break;
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = session.flush_and_roll() {
                    // Prior finalized chunks stay immutable; keep recording
                    error!(session_id = %session.session_id, error = %e, "Flush cycle failed");
                }
            }
        }
    }
}

impl ActiveSession {
    fn flush_and_roll(&mut self) -> Result<(), StoreError> {
        self.flush()?;

        let due = self
            .open_chunk
            .as_ref()
            .map(|c| c.opened_at.elapsed() >= self.config.roll_interval)
            .unwrap_or(false);
        if due {
            self.finalize_open_chunk()?;
        }
        Ok(())
    }

    /// Append the in-memory buffer to the current chunk's temp file,
    /// opening a new chunk (and writing its header) if none is open.
    fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        if self.open_chunk.is_none() {
            let index = self.manifest.next_index();
            self.open_chunk = Some(OpenChunk {
                index,
                path: self.dir.join(open_chunk_file_name(index)),
                opened_at: Instant::now(),
                rows: 0,
            });
        }
        let chunk = self.open_chunk.as_mut().expect("open chunk just ensured");

        let mut out = String::new();
        if chunk.rows == 0 {
            out.push_str(CSV_HEADER);
            out.push('\n');
        }
        for reading in &self.buffer {
            out.push_str(&render_row(reading));
            out.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&chunk.path)?;
        file.write_all(out.as_bytes())?;

        chunk.rows += self.buffer.len() as u64;
        metrics::counter!("store_readings_flushed_total").increment(self.buffer.len() as u64);
        self.buffer.clear();
        Ok(())
    }

    /// Rename the open chunk into its final name, hash it and record it in
    /// the manifest. A chunk that never received data is a no-op.
    fn finalize_open_chunk(&mut self) -> Result<(), StoreError> {
        let Some(chunk) = self.open_chunk.take() else {
            return Ok(());
        };
        if chunk.rows == 0 {
            return Ok(());
        }

        let name = chunk_file_name(chunk.index);
        let final_path = self.dir.join(&name);
        std::fs::rename(&chunk.path, &final_path)
            .map_err(|e| StoreError::chunk_finalize(chunk.index, e.to_string()))?;

        let sha256 = integrity::hash_file(&final_path)?;
        let size_bytes = std::fs::metadata(&final_path)?.len();
        let row_count = count_reading_rows(&final_path)?;

        self.manifest.push_chunk(ChunkMetadata {
            index: chunk.index,
            name: name.clone(),
            row_count,
            sha256,
            size_bytes,
            timestamp: Utc::now(),
        });
        write_manifest(&self.dir, &self.manifest)?;

        metrics::counter!("store_chunks_finalized_total").increment(1);
        metrics::histogram!("store_chunk_rows").record(row_count as f64);
        debug!(
            session_id = %self.session_id,
            index = chunk.index,
            rows = row_count,
            bytes = size_bytes,
            "Chunk finalized"
        );
        Ok(())
    }

    fn stop(&mut self, marker: Option<Reading>) -> Result<SessionSummary, StoreError> {
        if let Some(marker) = marker {
            self.buffer.push(marker);
        }
        self.flush()?;
        self.finalize_open_chunk()?;

        let outcome = combine_session(&self.dir, &mut self.manifest)?;

        Ok(SessionSummary {
            session_id: self.session_id.clone(),
            rows: outcome.rows,
            bytes: outcome.bytes,
            session_file: outcome.session_file,
            verified: outcome.verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SyncId, SYNC_STOP};

    use crate::csv::read_session_file;
    use crate::manifest::load_manifest;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            flush_interval: Duration::from_millis(5),
            roll_interval: Duration::from_millis(20),
            buffer_ceiling: 10_000,
        }
    }

    fn reading(offset_ms: i64, value: f64) -> Reading {
        Reading {
            time: Utc::now() + chrono::Duration::milliseconds(offset_ms),
            sensor_id: "probe".into(),
            mode: "pH".into(),
            value,
            temp_c: Some(20.0),
            vin: Some(12.1),
        }
    }

    #[tokio::test]
    async fn test_record_roll_and_combine() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start_session(dir.path(), "probe", "dive", fast_config())
            .await
            .unwrap();
        let session_dir = handle.dir().to_path_buf();

        for i in 0..20 {
            handle.add_reading(reading(i * 10, i as f64)).await.unwrap();
            if i == 9 {
                // Let at least one roll happen mid-recording
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
        }

        let summary = handle.stop(None).await.unwrap();
        assert!(summary.verified);
        assert_eq!(summary.rows, 20);
        assert!(summary.session_file.exists());

        // Combined file carries every reading; chunks were cleaned up
        let parsed = read_session_file(&summary.session_file).unwrap();
        assert_eq!(parsed.readings.len(), 20);
        assert!(!session_dir.join(chunk_file_name(0)).exists());

        let manifest = load_manifest(&session_dir).unwrap();
        assert_eq!(manifest.total_rows, 20);
        assert!(manifest.chunks.len() >= 2, "expected a mid-session roll");
        assert!(manifest.session_sha256.is_some());

        // Row-count conservation: manifest total is the chunk sum
        let chunk_sum: u64 = manifest.chunks.iter().map(|c| c.row_count).sum();
        assert_eq!(chunk_sum, manifest.total_rows);
    }

    #[tokio::test]
    async fn test_stop_marker_is_final_row() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start_session(dir.path(), "probe", "dive", fast_config())
            .await
            .unwrap();

        handle.add_reading(reading(0, 7.0)).await.unwrap();
        let marker = Reading::marker(Utc::now(), "probe", SYNC_STOP, SyncId(99));
        let summary = handle.stop(Some(marker)).await.unwrap();

        assert_eq!(summary.rows, 2);
        let parsed = read_session_file(&summary.session_file).unwrap();
        assert_eq!(parsed.readings.len(), 1);
        assert_eq!(parsed.markers.len(), 1);
        assert_eq!(parsed.markers[0].sync_id(), Some(SyncId(99)));
    }

    #[tokio::test]
    async fn test_empty_session_combines_clean() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start_session(dir.path(), "probe", "dive", fast_config())
            .await
            .unwrap();

        let summary = handle.stop(None).await.unwrap();
        assert!(summary.verified);
        assert_eq!(summary.rows, 0);
        assert!(summary.session_file.exists());
    }

    #[tokio::test]
    async fn test_buffer_ceiling_forces_flush() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            // Flush timer effectively disabled; only the ceiling can flush
            flush_interval: Duration::from_secs(3600),
            roll_interval: Duration::from_secs(3600),
            buffer_ceiling: 5,
        };
        let handle = start_session(dir.path(), "probe", "dive", config)
            .await
            .unwrap();
        let session_dir = handle.dir().to_path_buf();

        for i in 0..5 {
            handle.add_reading(reading(i * 10, i as f64)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let open_path = session_dir.join(open_chunk_file_name(0));
        assert!(open_path.exists(), "ceiling flush should create the chunk");
        assert_eq!(count_reading_rows(&open_path).unwrap(), 5);

        let summary = handle.stop(None).await.unwrap();
        assert_eq!(summary.rows, 5);
    }
}
