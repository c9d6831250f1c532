//! # Fusion
//!
//! Merges the two sensors' finalized session files into one wide-format
//! CSV, after mapping the in-water stream onto the surface clock with a
//! drift model estimated from recovered sync markers.
//!
//! Fusion never fabricates data: every value in the output comes from one
//! of the two input session files, and every terminal outcome (complete,
//! skipped, failed) is recorded in the pair's sync metadata so callers can
//! tell "nothing to fuse" apart from "fusion ran and failed".

mod axis;
mod drift;
mod engine;
mod error;
mod output;

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use contracts::{session_file_name, DriftModel, FusionConfig, FusionStatus, Reading, SensorRole};
use session_store::{read_session_file, SyncMetadataStore};

pub use axis::build_axis;
pub use drift::{estimate, DriftEstimate, RecoveredMarkers};
pub use engine::{fuse, WideRow};
pub use error::FusionError;
pub use output::{render_wide_row, unified_file_name, write_unified, UNIFIED_HEADER};

/// Terminal outcome of one fusion run.
#[derive(Debug, Clone)]
pub struct FusionReport {
    pub status: FusionStatus,
    pub rows: u64,
    pub output_file: Option<PathBuf>,
    pub error: Option<String>,
}

/// Run fusion over a session-pair directory.
///
/// Preconditions are checked against the pair's sync metadata: a
/// single-sensor session is `skipped` (expected operating mode, no output
/// file), an incomplete or unreadable pair is `failed` with a reason.
#[instrument(name = "run_fusion", skip_all, fields(pair_dir = %pair_dir.display()))]
pub fn run_fusion(
    pair_dir: &Path,
    config: &FusionConfig,
    coarse_offset_ms: Option<f64>,
) -> Result<FusionReport, FusionError> {
    let store = SyncMetadataStore::new(pair_dir);
    let meta = store
        .load()?
        .ok_or_else(|| FusionError::precondition("no sync metadata in pair directory"))?;
    let mission = meta.mission.clone();

    if meta.is_single_sensor() {
        info!(mission = %mission, "Single-sensor session; nothing to fuse");
        store.update(&mission, |m| {
            m.fusion.status = FusionStatus::Skipped;
            m.fusion.rows = 0;
            m.fusion.error = None;
        })?;
        return Ok(FusionReport {
            status: FusionStatus::Skipped,
            rows: 0,
            output_file: None,
            error: None,
        });
    }

    if !meta.both_complete() {
        return fail(&store, &mission, "both session files must be complete");
    }

    match fuse_pair(pair_dir, &store, config, coarse_offset_ms) {
        Ok(outcome) => {
            let rows = outcome.rows;
            store.update(&mission, |m| {
                m.markers = outcome.markers;
                m.drift_model = outcome.model;
                m.fusion.status = FusionStatus::Complete;
                m.fusion.rows = rows;
                m.fusion.error = None;
            })?;
            metrics::counter!("fusion_rows_total").increment(rows);
            info!(mission = %mission, rows, output = %outcome.output_file.display(), "Fusion complete");
            Ok(FusionReport {
                status: FusionStatus::Complete,
                rows,
                output_file: Some(outcome.output_file),
                error: None,
            })
        }
        Err(e) => fail(&store, &mission, &e.to_string()),
    }
}

fn fail(
    store: &SyncMetadataStore,
    mission: &str,
    message: &str,
) -> Result<FusionReport, FusionError> {
    warn!(mission = %mission, reason = %message, "Fusion failed");
    metrics::counter!("fusion_failures_total").increment(1);
    store.update(mission, |m| {
        m.fusion.status = FusionStatus::Failed;
        m.fusion.error = Some(message.to_string());
    })?;
    Ok(FusionReport {
        status: FusionStatus::Failed,
        rows: 0,
        output_file: None,
        error: Some(message.to_string()),
    })
}

struct FusionOutcome {
    rows: u64,
    output_file: PathBuf,
    markers: Vec<contracts::SyncMarker>,
    model: Option<DriftModel>,
}

fn fuse_pair(
    pair_dir: &Path,
    store: &SyncMetadataStore,
    config: &FusionConfig,
    coarse_offset_ms: Option<f64>,
) -> Result<FusionOutcome, FusionError> {
    let meta = store
        .load()?
        .ok_or_else(|| FusionError::precondition("sync metadata disappeared"))?;

    let session_path = |role: SensorRole| -> Result<PathBuf, FusionError> {
        let record = meta
            .sensor(role)
            .ok_or_else(|| FusionError::precondition(format!("no {role} sensor record")))?;
        Ok(pair_dir
            .join(&record.session_id)
            .join(session_file_name(&record.session_id)))
    };

    let surface = read_session_file(&session_path(SensorRole::Surface)?)?;
    let inwater = read_session_file(&session_path(SensorRole::Inwater)?)?;

    let estimate = drift::estimate(
        &RecoveredMarkers::from_readings(&surface.markers),
        &RecoveredMarkers::from_readings(&inwater.markers),
        coarse_offset_ms,
    );

    let inwater_corrected: Vec<Reading> = match &estimate.model {
        Some(model) => inwater
            .readings
            .iter()
            .map(|r| Reading {
                time: model.correct(r.time),
                ..r.clone()
            })
            .collect(),
        None => inwater.readings.clone(),
    };

    let rows = engine::fuse(&inwater_corrected, &surface.readings, config);

    let output_file = pair_dir.join(unified_file_name(&meta.mission));
    output::write_unified(&output_file, &rows)?;

    Ok(FusionOutcome {
        rows: rows.len() as u64,
        output_file,
        markers: estimate.markers,
        model: estimate.model,
    })
}
