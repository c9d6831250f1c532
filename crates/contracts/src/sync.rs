//! Synchronization records - markers, drift models, and the shared
//! per-session-pair metadata document.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{SensorRole, SyncId};

/// Marker kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    Start,
    Stop,
}

/// Whether a marker endpoint was measured or synthesized from a coarse offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerQuality {
    Measured,
    Synthetic,
}

/// A paired synchronization event recovered from the two streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMarker {
    pub sync_id: SyncId,
    pub marker_type: MarkerType,

    /// Surface-sensor timestamp of the event, if that side recorded it
    pub local_timestamp: Option<DateTime<Utc>>,

    /// In-water-sensor timestamp of the event, if that side recorded it
    pub remote_timestamp: Option<DateTime<Utc>>,

    /// remote - local, in milliseconds, when both sides are present
    pub offset_ms: Option<f64>,

    pub quality: MarkerQuality,
}

/// Clock-offset correction mapping in-water time into the surface frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftModel {
    /// Fixed offset for the whole session
    Constant { offset_ms: f64 },

    /// Offset growing linearly in elapsed time
    Linear {
        start_offset_ms: f64,
        end_offset_ms: f64,
        drift_rate_per_ms: f64,
        reference_time: DateTime<Utc>,
    },
}

impl DriftModel {
    /// Map an in-water timestamp into the surface clock frame.
    pub fn correct(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let offset_ms = match self {
            Self::Constant { offset_ms } => *offset_ms,
            Self::Linear {
                start_offset_ms,
                drift_rate_per_ms,
                reference_time,
                ..
            } => {
                let elapsed_ms = (time - *reference_time).num_milliseconds() as f64;
                start_offset_ms + drift_rate_per_ms * elapsed_ms
            }
        };
        time - Duration::milliseconds(offset_ms.round() as i64)
    }
}

/// Sensor lifecycle within a recording session pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorState {
    /// Chunks still accumulating
    Recording,
    /// Session file combined and verified
    Complete,
    /// Session file written but row-count verification failed; chunks kept
    Degraded,
}

/// Per-sensor lifecycle record in [`SyncMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub session_id: String,
    pub state: SensorState,
    pub rows: u64,
    pub bytes: u64,
}

/// Terminal (or pending) state of the fusion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStatus {
    /// Not attempted yet
    Pending,
    /// Unified output written
    Complete,
    /// Expected single-sensor session, nothing to fuse
    Skipped,
    /// Fusion ran and failed
    Failed,
}

/// Fusion outcome record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionRecord {
    pub status: FusionStatus,
    pub rows: u64,
    pub error: Option<String>,
}

impl Default for FusionRecord {
    fn default() -> Self {
        Self {
            status: FusionStatus::Pending,
            rows: 0,
            error: None,
        }
    }
}

/// Shared document per recording session pair.
///
/// Single source of truth for sensor lifecycle, recovered markers, the
/// chosen drift model and fusion status. Writers must read the latest
/// document, apply one mutation and write back atomically; cached copies
/// must never be assumed current.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub mission: String,
    pub sensors: HashMap<SensorRole, SensorRecord>,
    pub markers: Vec<SyncMarker>,
    pub drift_model: Option<DriftModel>,
    #[serde(default)]
    pub fusion: FusionRecord,
}

impl SyncMetadata {
    pub fn new(mission: impl Into<String>) -> Self {
        Self {
            mission: mission.into(),
            ..Default::default()
        }
    }

    pub fn sensor(&self, role: SensorRole) -> Option<&SensorRecord> {
        self.sensors.get(&role)
    }

    /// Whether a role has a verified session file.
    pub fn is_complete(&self, role: SensorRole) -> bool {
        self.sensor(role)
            .map(|r| r.state == SensorState::Complete)
            .unwrap_or(false)
    }

    /// Whether both sensors have completed session files (fusion precondition).
    pub fn both_complete(&self) -> bool {
        self.is_complete(SensorRole::Inwater) && self.is_complete(SensorRole::Surface)
    }

    /// Exactly one sensor recorded anything at all.
    pub fn is_single_sensor(&self) -> bool {
        self.sensors.len() == 1
    }
}
