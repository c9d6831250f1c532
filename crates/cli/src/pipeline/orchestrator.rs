//! Mission orchestrator - coordinates recording, replication and fusion.
//!
//! One mission run produces a session pair directory: the local sensor is
//! recorded in-process, the remote sensor is mirrored from the peer, and
//! whichever side finishes with both session files verified triggers
//! fusion.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use contracts::{
    MissionBlueprint, Reading, SensorRecord, SensorRole, SensorState, SyncId, SyncMetadata,
    SYNC_START, SYNC_STOP,
};
use observability::{record_fusion_outcome, record_reading_captured, MissionStatsAggregator};
use replication::{
    start_mirror, HttpPeerClient, MirrorConfig, MirrorHandle, SyncMarkerCoordinator,
};
use session_store::{
    start_session, SessionConfig, SessionHandle, SessionSummary, SyncMetadataStore,
};

use super::{MissionRunStats, MockProbeSource, ProbeConfig};

const READING_CHANNEL_CAPACITY: usize = 256;

/// Mission configuration
#[derive(Debug, Clone)]
pub struct MissionConfig {
    /// The mission blueprint configuration
    pub blueprint: MissionBlueprint,

    /// Recording duration (None = run until shutdown signal)
    pub duration: Option<Duration>,

    /// Record the local sensor only; skip peer replication
    pub offline: bool,

    /// Local probe cadence in Hz
    pub frequency_hz: f64,

    /// Coarse clock offset fallback for drift estimation
    pub coarse_offset_ms: Option<f64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main mission orchestrator
pub struct MissionRunner {
    config: MissionConfig,
}

/// The replication side of a running mission.
struct MirrorSide {
    coordinator: SyncMarkerCoordinator<HttpPeerClient>,
    handle: MirrorHandle,
}

impl MissionRunner {
    /// Create a new runner with the given configuration
    pub fn new(config: MissionConfig) -> Self {
        Self { config }
    }

    /// Run the mission to completion.
    ///
    /// The shutdown future ends the recording phase early; the stop
    /// sequence (finalize, combine, metadata, fusion) always runs.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<MissionRunStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let mission = blueprint.mission.label.clone();

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // One timestamp names the pair directory and the peer session
        let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let pair_dir = PathBuf::from(&blueprint.storage.root_dir).join(format!("{mission}_{stamp}"));
        std::fs::create_dir_all(&pair_dir)
            .with_context(|| format!("Failed to create pair directory {}", pair_dir.display()))?;
        let meta_store = SyncMetadataStore::new(&pair_dir);

        info!(pair_dir = %pair_dir.display(), "Session pair directory created");

        // Local recording session
        let session = start_session(
            &pair_dir,
            &blueprint.sensors.local.sensor_id,
            &mission,
            SessionConfig::from(&blueprint.recording),
        )
        .await
        .context("Failed to start local session")?;

        meta_store.update(&mission, |m| {
            m.sensors.insert(
                SensorRole::Surface,
                SensorRecord {
                    session_id: session.session_id().to_string(),
                    state: SensorState::Recording,
                    rows: 0,
                    bytes: 0,
                },
            );
        })?;

        // Replication side, unless running offline
        let sync_id = SyncId::generate();
        let mirror_side = if self.config.offline {
            info!("Offline mode - recording the local sensor only");
            let marker = Reading::marker(
                Utc::now(),
                session.sensor_id(),
                SYNC_START,
                sync_id,
            );
            session.add_reading(marker).await?;
            None
        } else {
            let side = self
                .start_replication(&mission, &stamp, &pair_dir, &meta_store)
                .await
                .context("Failed to start replication")?;
            side.coordinator
                .begin(&session, sync_id)
                .await
                .context("Failed to inject sync start marker")?;
            Some(side)
        };

        // Recording phase
        let mut stats_agg = MissionStatsAggregator::new();
        let source = MockProbeSource::new(ProbeConfig {
            sensor_id: blueprint.sensors.local.sensor_id.clone(),
            frequency_hz: self.config.frequency_hz,
            ..Default::default()
        });
        let mut readings = source.start(READING_CHANNEL_CAPACITY);

        info!(
            duration = ?self.config.duration,
            frequency_hz = self.config.frequency_hz,
            "Recording started"
        );

        self.recording_loop(&session, &mut readings, &mut stats_agg, shutdown)
            .await?;
        source.stop();

        // Stop sequence: marker, combine, metadata, fusion
        let stop_marker = match &mirror_side {
            Some(side) => side.coordinator.end(&session, sync_id).await,
            None => Reading::marker(Utc::now(), session.sensor_id(), SYNC_STOP, sync_id),
        };
        stats_agg.update(&stop_marker);

        let local_summary = session
            .stop(Some(stop_marker))
            .await
            .context("Failed to stop local session")?;

        let mut doc = self.finish_sensor(&meta_store, &mission, SensorRole::Surface, &local_summary)?;

        let remote_summary = match mirror_side {
            Some(side) => match side.handle.stop().await {
                Ok(summary) => {
                    doc = self.finish_sensor(&meta_store, &mission, SensorRole::Inwater, &summary)?;
                    Some(summary)
                }
                Err(e) => {
                    // Local data is safe on disk either way; the mirror can
                    // be resumed and the pair fused later by hand.
                    warn!(error = %e, "Mirror stop failed; fusion deferred");
                    None
                }
            },
            None => None,
        };

        let fusion_report = self.maybe_fuse(&doc, &pair_dir)?;

        Ok(MissionRunStats {
            duration: start_time.elapsed(),
            pair_dir,
            local_summary,
            remote_summary,
            fusion_report,
            recording: stats_agg.summary(),
        })
    }

    /// Feed probe readings into the session until the duration elapses,
    /// the source closes, or a shutdown signal arrives.
    async fn recording_loop(
        &self,
        session: &SessionHandle,
        readings: &mut mpsc::Receiver<Reading>,
        stats_agg: &mut MissionStatsAggregator,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                maybe = readings.recv() => match maybe {
                    Some(reading) => {
                        record_reading_captured(&reading.sensor_id, &reading.mode);
                        stats_agg.update(&reading);
                        session.add_reading(reading).await?;
                    }
                    None => {
                        warn!("Probe source closed unexpectedly");
                        break;
                    }
                },
                _ = &mut deadline => {
                    info!("Recording duration elapsed");
                    break;
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping mission...");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Start the peer mirror and marker coordinator.
    async fn start_replication(
        &self,
        mission: &str,
        stamp: &str,
        pair_dir: &std::path::Path,
        meta_store: &SyncMetadataStore,
    ) -> Result<MirrorSide> {
        let blueprint = &self.config.blueprint;
        let remote = &blueprint.sensors.remote;

        let peer = HttpPeerClient::new(
            &remote.base_url,
            Duration::from_secs(blueprint.replication.request_timeout_secs),
        )?;

        // The peer names its session by the shared mission convention
        let remote_session_id = format!("{mission}_{}_{stamp}", remote.sensor_id);
        let coordinator = SyncMarkerCoordinator::new(peer.clone(), remote_session_id.clone());

        meta_store.update(mission, |m| {
            m.sensors.insert(
                SensorRole::Inwater,
                SensorRecord {
                    session_id: remote_session_id.clone(),
                    state: SensorState::Recording,
                    rows: 0,
                    bytes: 0,
                },
            );
        })?;

        let handle = start_mirror(
            &remote_session_id,
            &remote.sensor_id,
            mission,
            peer,
            &pair_dir.join(&remote_session_id),
            MirrorConfig::from(&blueprint.replication),
        )
        .await?;

        Ok(MirrorSide {
            coordinator,
            handle,
        })
    }

    /// Record a finished session into the shared metadata document.
    fn finish_sensor(
        &self,
        meta_store: &SyncMetadataStore,
        mission: &str,
        role: SensorRole,
        summary: &SessionSummary,
    ) -> Result<SyncMetadata> {
        let state = if summary.verified {
            SensorState::Complete
        } else {
            SensorState::Degraded
        };
        info!(
            role = %role,
            session_id = %summary.session_id,
            rows = summary.rows,
            verified = summary.verified,
            "Session finished"
        );

        let doc = meta_store.update(mission, |m| {
            m.sensors.insert(
                role,
                SensorRecord {
                    session_id: summary.session_id.clone(),
                    state,
                    rows: summary.rows,
                    bytes: summary.bytes,
                },
            );
        })?;
        Ok(doc)
    }

    /// Last-finisher fusion: run when both session files verified, or to
    /// mark an expected single-sensor session as skipped.
    fn maybe_fuse(
        &self,
        doc: &SyncMetadata,
        pair_dir: &std::path::Path,
    ) -> Result<Option<fusion::FusionReport>> {
        if !doc.both_complete() && !doc.is_single_sensor() {
            warn!(
                pair_dir = %pair_dir.display(),
                "Session pair incomplete; repair and run `hydro-syncer fuse`"
            );
            return Ok(None);
        }

        let report = fusion::run_fusion(
            pair_dir,
            &self.config.blueprint.fusion,
            self.config.coarse_offset_ms,
        )
        .context("Fusion failed")?;
        record_fusion_outcome(report.status, report.rows);
        Ok(Some(report))
    }
}
