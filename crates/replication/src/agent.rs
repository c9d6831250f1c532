//! Polling mirror of the remote sensor's chunk store.
//!
//! Mirroring is pull-only and resumable: the cursor in
//! `mirror_progress.json` advances only past hash-verified chunks, and the
//! mirror keeps its own manifest so the stop path can reuse the store's
//! combine/verify/cleanup sequence unchanged.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use contracts::{ChunkMetadata, Manifest, MirrorProgress, ReplicationConfig};
use session_store::{
    combine_session, count_reading_rows, load_manifest, manifest_path, write_manifest,
    SessionSummary,
};

use crate::error::ReplicationError;
use crate::peer::PeerClient;

const PROGRESS_FILE: &str = "mirror_progress.json";

/// Mirror schedule settings.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Poll cadence
    pub cadence: Duration,

    /// Wait after stop before the final poll, covering the peer's last
    /// chunk finalization
    pub finalize_grace: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self::from(&ReplicationConfig::default())
    }
}

impl From<&ReplicationConfig> for MirrorConfig {
    fn from(config: &ReplicationConfig) -> Self {
        let cadence_secs = if config.full_bandwidth {
            config.full_bandwidth_cadence_secs
        } else {
            config.cadence_secs
        };
        Self {
            cadence: Duration::from_secs(cadence_secs),
            finalize_grace: Duration::from_secs(config.finalize_grace_secs),
        }
    }
}

/// What one poll cycle accomplished.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOutcome {
    pub chunks_mirrored: u64,
    pub bytes_mirrored: u64,

    /// A hash mismatch ended the cycle early; the chunk will be retried
    /// next cycle
    pub stopped_on_mismatch: bool,
}

/// Read the resumable cursor for a mirror directory (default when absent).
pub fn load_progress(mirror_dir: &Path) -> Result<MirrorProgress, ReplicationError> {
    let path = mirror_dir.join(PROGRESS_FILE);
    if !path.exists() {
        return Ok(MirrorProgress::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content).map_err(|e| {
        ReplicationError::Core(contracts::CoreError::Other(format!(
            "mirror progress parse error at {}: {e}",
            path.display()
        )))
    })
}

fn write_progress(mirror_dir: &Path, progress: &MirrorProgress) -> Result<(), ReplicationError> {
    integrity::atomic_write_json(&mirror_dir.join(PROGRESS_FILE), progress)?;
    Ok(())
}

enum MirrorCommand {
    Stop {
        ack: oneshot::Sender<Result<SessionSummary, ReplicationError>>,
    },
}

/// Handle to a running mirror worker.
pub struct MirrorHandle {
    session_id: String,
    dir: PathBuf,
    tx: mpsc::Sender<MirrorCommand>,
    worker: JoinHandle<()>,
}

impl MirrorHandle {
    /// Remote session id being mirrored.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Local mirror directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop mirroring: cancel the schedule, wait the finalization grace,
    /// run one final poll, then combine and verify the mirrored session.
    #[instrument(name = "mirror_stop", skip(self), fields(session_id = %self.session_id))]
    pub async fn stop(self) -> Result<SessionSummary, ReplicationError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(MirrorCommand::Stop { ack: ack_tx })
            .await
            .map_err(|_| ReplicationError::mirror_stopped(&self.session_id))?;

        let result = ack_rx
            .await
            .map_err(|_| ReplicationError::mirror_stopped(&self.session_id))?;

        if let Err(e) = self.worker.await {
            error!(session_id = %self.session_id, error = ?e, "Mirror worker panicked");
        }
        result
    }
}

/// Start mirroring `session_id` from `peer` into `mirror_dir`.
///
/// Any existing manifest and progress cursor in the directory are picked
/// up, so a restarted agent resumes instead of re-downloading. One poll
/// runs before the handle is returned.
pub async fn start_mirror<C>(
    session_id: &str,
    sensor_id: &str,
    mission: &str,
    peer: C,
    mirror_dir: &Path,
    config: MirrorConfig,
) -> Result<MirrorHandle, ReplicationError>
where
    C: PeerClient + 'static,
{
    std::fs::create_dir_all(mirror_dir)?;

    let manifest = if manifest_path(mirror_dir).exists() {
        load_manifest(mirror_dir)?
    } else {
        let manifest = Manifest::new(session_id, sensor_id, mission, Utc::now());
        write_manifest(mirror_dir, &manifest)?;
        manifest
    };
    let mut progress = load_progress(mirror_dir)?;

    // The manifest is written before the cursor, so a crash between the
    // two leaves the manifest one chunk ahead. The manifest wins: pushing
    // that chunk again would duplicate its rows in the combined file.
    let recorded = manifest.chunks.last().map(|c| c.index);
    if recorded > progress.last_chunk_index {
        warn!(
            session_id,
            manifest_index = ?recorded,
            cursor_index = ?progress.last_chunk_index,
            "Cursor behind manifest; reconciling"
        );
        progress.last_chunk_index = recorded;
        progress.bytes_mirrored = manifest.total_bytes;
        write_progress(mirror_dir, &progress)?;
    }
    let resumed = progress.last_chunk_index.is_some();

    let mut mirror = Mirror {
        session_id: session_id.to_string(),
        peer,
        dir: mirror_dir.to_path_buf(),
        progress,
        manifest,
    };

    info!(
        session_id,
        dir = %mirror_dir.display(),
        resumed,
        cadence_secs = config.cadence.as_secs(),
        "Mirror started"
    );

    if let Err(e) = mirror.poll_once().await {
        warn!(session_id, error = %e, "Initial poll failed; will retry on schedule");
    }

    let (tx, rx) = mpsc::channel(1);
    let dir = mirror.dir.clone();
    let worker = tokio::spawn(mirror_worker(mirror, rx, config));

    Ok(MirrorHandle {
        session_id: session_id.to_string(),
        dir,
        tx,
        worker,
    })
}

async fn mirror_worker<C: PeerClient>(
    mut mirror: Mirror<C>,
    mut rx: mpsc::Receiver<MirrorCommand>,
    config: MirrorConfig,
) {
    let mut ticker = tokio::time::interval(config.cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The initial poll already ran; consume the interval's immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let ack = match cmd {
                    Some(MirrorCommand::Stop { ack }) => Some(ack),
                    None => None,
                };

                tokio::time::sleep(config.finalize_grace).await;
                if let Err(e) = mirror.poll_once().await {
                    warn!(session_id = %mirror.session_id, error = %e, "Final poll failed");
                }

                let result = mirror.finish();
                match ack {
                    Some(ack) => {
                        let _ = ack.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            error!(session_id = %mirror.session_id, error = %e, "Implicit mirror stop failed");
                        }
                    }
                }
                break;
            }
            _ = ticker.tick() => {
                // Transient errors keep the schedule alive
                if let Err(e) = mirror.poll_once().await {
                    warn!(session_id = %mirror.session_id, error = %e, "Poll failed; retrying next cycle");
                }
            }
        }
    }
}

struct Mirror<C> {
    session_id: String,
    peer: C,
    dir: PathBuf,
    progress: MirrorProgress,
    manifest: Manifest,
}

impl<C: PeerClient> Mirror<C> {
    /// One poll cycle: fetch the catalog and mirror every chunk beyond the
    /// cursor, in index order, verifying each before it counts.
    #[instrument(name = "mirror_poll", skip(self), fields(session_id = %self.session_id))]
    async fn poll_once(&mut self) -> Result<PollOutcome, ReplicationError> {
        let catalog = self.peer.fetch_catalog(&self.session_id).await?;

        let mut wanted: Vec<_> = catalog
            .into_iter()
            .filter(|entry| self.progress.wants(entry.index))
            .collect();
        wanted.sort_by_key(|entry| entry.index);

        let mut outcome = PollOutcome::default();
        for entry in wanted {
            let part_path = self.dir.join(format!("{}.part", entry.name));
            let bytes = self.peer.fetch_chunk(&self.session_id, &entry.name).await?;
            std::fs::write(&part_path, &bytes)?;

            let actual = integrity::hash_file(&part_path)?;
            if actual != entry.sha256 {
                warn!(
                    chunk = %entry.name,
                    expected = %entry.sha256,
                    actual = %actual,
                    "Hash mismatch; dropping download, retrying next cycle"
                );
                let _ = std::fs::remove_file(&part_path);
                metrics::counter!("mirror_hash_mismatch_total").increment(1);
                outcome.stopped_on_mismatch = true;
                break;
            }

            let final_path = self.dir.join(&entry.name);
            std::fs::rename(&part_path, &final_path)?;

            self.manifest.push_chunk(ChunkMetadata {
                index: entry.index,
                name: entry.name.clone(),
                row_count: count_reading_rows(&final_path)?,
                sha256: entry.sha256,
                size_bytes: entry.size_bytes,
                timestamp: Utc::now(),
            });
            write_manifest(&self.dir, &self.manifest)?;

            self.progress.last_chunk_index = Some(entry.index);
            self.progress.bytes_mirrored += entry.size_bytes;
            self.progress.last_sync_time = Some(Utc::now());
            write_progress(&self.dir, &self.progress)?;

            metrics::counter!("mirror_chunks_total").increment(1);
            metrics::counter!("mirror_bytes_total").increment(entry.size_bytes);
            outcome.chunks_mirrored += 1;
            outcome.bytes_mirrored += entry.size_bytes;

            debug!(chunk = %entry.name, bytes = entry.size_bytes, "Chunk mirrored");
        }

        Ok(outcome)
    }

    /// Combine the mirrored chunks into the session file (shared store
    /// combine path) and report final counts.
    fn finish(&mut self) -> Result<SessionSummary, ReplicationError> {
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
    use contracts::Reading;
    use session_store::{read_session_file, render_row, CSV_HEADER};

    use crate::mock::MockPeerClient;

    fn chunk_csv(start: i64, rows: usize) -> String {
        let mut content = format!("{CSV_HEADER}\n");
        for i in 0..rows {
            let reading = Reading {
                time: Utc::now() + chrono::Duration::milliseconds(start + i as i64 * 100),
                sensor_id: "inwater-ph".into(),
                mode: "pH".into(),
                value: 7.0 + i as f64 * 0.01,
                temp_c: Some(12.0),
                vin: Some(11.8),
            };
            content.push_str(&render_row(&reading));
            content.push('\n');
        }
        content
    }

    fn test_mirror(peer: MockPeerClient, dir: &Path) -> Mirror<MockPeerClient> {
        Mirror {
            session_id: "remote-s1".into(),
            peer,
            dir: dir.to_path_buf(),
            progress: MirrorProgress::default(),
            manifest: Manifest::new("remote-s1", "inwater-ph", "dive-12", Utc::now()),
        }
    }

    fn slow_config() -> MirrorConfig {
        MirrorConfig {
            cadence: Duration::from_secs(3600),
            finalize_grace: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_poll_mirrors_in_order_and_persists_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));
        peer.publish_chunk(1, &chunk_csv(300, 2));

        let mut mirror = test_mirror(peer, dir.path());
        let outcome = mirror.poll_once().await.unwrap();

        assert_eq!(outcome.chunks_mirrored, 2);
        assert!(!outcome.stopped_on_mismatch);
        assert!(dir.path().join(contracts::chunk_file_name(0)).exists());
        assert!(dir.path().join(contracts::chunk_file_name(1)).exists());
        assert_eq!(mirror.manifest.total_rows, 5);

        let progress = load_progress(dir.path()).unwrap();
        assert_eq!(progress.last_chunk_index, Some(1));
        assert_eq!(progress.bytes_mirrored, outcome.bytes_mirrored);
        assert!(progress.last_sync_time.is_some());
    }

    #[tokio::test]
    async fn test_hash_mismatch_never_advances_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));
        peer.publish_chunk(1, &chunk_csv(300, 2));
        peer.corrupt_chunk(0);

        let mut mirror = test_mirror(peer.clone(), dir.path());
        let outcome = mirror.poll_once().await.unwrap();

        assert!(outcome.stopped_on_mismatch);
        assert_eq!(outcome.chunks_mirrored, 0);
        // Poll ended at the bad chunk; the next one was never requested
        assert_eq!(peer.chunk_fetches(), 1);

        assert_eq!(load_progress(dir.path()).unwrap().last_chunk_index, None);
        assert!(!dir.path().join(contracts::chunk_file_name(0)).exists());
        assert!(!dir
            .path()
            .join(format!("{}.part", contracts::chunk_file_name(0)))
            .exists());
    }

    #[tokio::test]
    async fn test_repeat_poll_downloads_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));

        let mut mirror = test_mirror(peer.clone(), dir.path());
        mirror.poll_once().await.unwrap();
        assert_eq!(peer.chunk_fetches(), 1);

        let outcome = mirror.poll_once().await.unwrap();
        assert_eq!(outcome.chunks_mirrored, 0);
        assert_eq!(peer.chunk_fetches(), 1);
        assert_eq!(peer.catalog_fetches(), 2);
    }

    #[tokio::test]
    async fn test_transient_catalog_error_keeps_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));
        peer.fail_next_catalog();

        let mut mirror = test_mirror(peer, dir.path());
        assert!(matches!(
            mirror.poll_once().await,
            Err(ReplicationError::Request { .. })
        ));
        assert_eq!(mirror.progress.last_chunk_index, None);

        // Next cycle succeeds
        let outcome = mirror.poll_once().await.unwrap();
        assert_eq!(outcome.chunks_mirrored, 1);
    }

    #[tokio::test]
    async fn test_stop_runs_final_poll_and_combines() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));

        let handle = start_mirror(
            "remote-s1",
            "inwater-ph",
            "dive-12",
            peer.clone(),
            dir.path(),
            slow_config(),
        )
        .await
        .unwrap();

        // Published after start; only the final stop poll can pick it up
        peer.publish_chunk(1, &chunk_csv(300, 2));

        let summary = handle.stop().await.unwrap();
        assert!(summary.verified);
        assert_eq!(summary.rows, 5);

        let parsed = read_session_file(&summary.session_file).unwrap();
        assert_eq!(parsed.readings.len(), 5);
        assert!(!dir.path().join(contracts::chunk_file_name(0)).exists());
    }

    #[tokio::test]
    async fn test_restart_resumes_without_redownload() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));

        // First agent run mirrors chunk 0, then dies without stopping
        {
            let mut mirror = test_mirror(peer.clone(), dir.path());
            write_manifest(dir.path(), &mirror.manifest).unwrap();
            mirror.poll_once().await.unwrap();
        }
        assert_eq!(peer.chunk_fetches(), 1);

        peer.publish_chunk(1, &chunk_csv(300, 2));

        // Restarted agent resumes from the persisted cursor
        let handle = start_mirror(
            "remote-s1",
            "inwater-ph",
            "dive-12",
            peer.clone(),
            dir.path(),
            slow_config(),
        )
        .await
        .unwrap();
        let summary = handle.stop().await.unwrap();

        assert!(summary.verified);
        assert_eq!(summary.rows, 5);
        // Chunk 0 was fetched exactly once across both runs
        assert_eq!(peer.chunk_fetches(), 2);
    }

    #[tokio::test]
    async fn test_crash_between_manifest_and_cursor_writes_never_duplicates_rows() {
        let dir = tempfile::tempdir().unwrap();
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &chunk_csv(0, 3));

        // First run mirrors chunk 0 into the manifest, then dies before
        // the cursor write lands
        {
            let mut mirror = test_mirror(peer.clone(), dir.path());
            write_manifest(dir.path(), &mirror.manifest).unwrap();
            mirror.poll_once().await.unwrap();
        }
        std::fs::remove_file(dir.path().join(PROGRESS_FILE)).unwrap();

        // The restarted agent reconciles the cursor from the manifest
        // instead of re-accepting the chunk
        let handle = start_mirror(
            "remote-s1",
            "inwater-ph",
            "dive-12",
            peer.clone(),
            dir.path(),
            slow_config(),
        )
        .await
        .unwrap();
        let summary = handle.stop().await.unwrap();

        assert!(summary.verified);
        assert_eq!(summary.rows, 3);
        assert_eq!(peer.chunk_fetches(), 1);

        let parsed = read_session_file(&summary.session_file).unwrap();
        assert_eq!(parsed.readings.len(), 3);

        let progress = load_progress(dir.path()).unwrap();
        assert_eq!(progress.last_chunk_index, Some(0));
    }
}
