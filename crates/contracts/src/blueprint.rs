//! MissionBlueprint - declarative mission configuration.
//!
//! Parsed from TOML/JSON by `config_loader`; tuning sections all have
//! defaults so a minimal config only names the mission and the sensors.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level mission configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MissionBlueprint {
    #[validate(nested)]
    pub mission: MissionInfo,

    #[validate(nested)]
    pub storage: StorageConfig,

    #[validate(nested)]
    pub sensors: SensorsConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub replication: ReplicationConfig,

    #[serde(default)]
    pub fusion: FusionConfig,
}

/// Mission identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MissionInfo {
    /// Mission label used in session ids and output paths
    #[validate(length(min = 1))]
    pub label: String,
}

/// Where session pairs are laid out on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    #[validate(length(min = 1))]
    pub root_dir: String,
}

/// The two sensors of a session pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SensorsConfig {
    #[validate(nested)]
    pub local: LocalSensorConfig,

    #[validate(nested)]
    pub remote: RemoteSensorConfig,
}

/// Surface sensor, recorded in-process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LocalSensorConfig {
    #[validate(length(min = 1))]
    pub sensor_id: String,
}

/// In-water sensor on the remote vehicle, mirrored over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RemoteSensorConfig {
    #[validate(length(min = 1))]
    pub sensor_id: String,

    /// Peer API base URL, e.g. `http://192.168.2.2:8090`
    #[validate(length(min = 1))]
    pub base_url: String,
}

/// ChunkedSessionStore tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Buffer flush cadence
    pub flush_interval_ms: u64,

    /// Chunk roll window
    pub roll_interval_secs: u64,

    /// Buffered readings that force an out-of-cycle flush
    pub buffer_ceiling: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 200,
            roll_interval_secs: 60,
            buffer_ceiling: 10_000,
        }
    }
}

/// ReplicationAgent tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Poll cadence in normal operation
    pub cadence_secs: u64,

    /// Poll cadence when full-bandwidth mode is requested
    pub full_bandwidth_cadence_secs: u64,

    /// Start in full-bandwidth mode
    pub full_bandwidth: bool,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Wait for the peer to finalize its last chunk before the final poll
    pub finalize_grace_secs: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 30,
            full_bandwidth_cadence_secs: 2,
            full_bandwidth: false,
            request_timeout_secs: 15,
            finalize_grace_secs: 2,
        }
    }
}

/// FusionEngine tuning.
///
/// The consolidation threshold and the gap factor are empirically chosen
/// against observed sensor cadences, not derived from a formal model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Alignment tolerance for matching readings to an axis point
    pub tolerance_ms: f64,

    /// Cluster width when consolidating the timestamp axis
    pub consolidation_ms: f64,

    /// A single-sensor row is a genuine gap once the other sensor has been
    /// silent for `gap_factor * tolerance_ms`
    pub gap_factor: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: 50.0,
            consolidation_ms: 25.0,
            gap_factor: 2.0,
        }
    }
}
