//! Reading - the unit of captured sensor data.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved mode marking a session-start synchronization event.
pub const SYNC_START: &str = "SYNC_START";

/// Reserved mode marking a session-stop synchronization event.
pub const SYNC_STOP: &str = "SYNC_STOP";

/// One typed sensor reading.
///
/// Immutable once produced. Marker readings (mode [`SYNC_START`] /
/// [`SYNC_STOP`]) carry a correlation id in `value` instead of a physical
/// measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Capture timestamp, stamped from the producing sensor's own clock
    pub time: DateTime<Utc>,

    /// Producing sensor ID
    pub sensor_id: String,

    /// Measurement mode (e.g. "pH", "ORP"), or a reserved sync marker mode
    pub mode: String,

    /// Primary measured value (correlation id for marker readings)
    pub value: f64,

    /// Probe temperature (C), if reported
    pub temp_c: Option<f64>,

    /// Supply voltage (V), if reported
    pub vin: Option<f64>,
}

impl Reading {
    /// Whether this reading is a sync marker rather than data.
    pub fn is_marker(&self) -> bool {
        self.mode == SYNC_START || self.mode == SYNC_STOP
    }

    /// Build a sync marker reading carrying `sync_id` in the value column.
    pub fn marker(
        time: DateTime<Utc>,
        sensor_id: impl Into<String>,
        mode: &str,
        sync_id: SyncId,
    ) -> Self {
        Self {
            time,
            sensor_id: sensor_id.into(),
            mode: mode.to_string(),
            value: sync_id.as_f64(),
            temp_c: None,
            vin: None,
        }
    }

    /// Recover the correlation id from a marker reading.
    pub fn sync_id(&self) -> Option<SyncId> {
        if self.is_marker() {
            SyncId::from_value(self.value)
        } else {
            None
        }
    }
}

/// Correlation id pairing sync markers across the two sensors.
///
/// Millisecond-epoch derived and kept below 2^53 so it survives the CSV
/// float column losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncId(pub u64);

impl SyncId {
    const MAX_EXACT_F64: u64 = 1 << 53;

    /// Generate a fresh id from the current wall clock.
    pub fn generate() -> Self {
        Self(Utc::now().timestamp_millis() as u64)
    }

    /// Value-column representation.
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// Recover an id from a value column; rejects non-integral or oversized values.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
            let raw = value as u64;
            (raw < Self::MAX_EXACT_F64).then_some(Self(raw))
        } else {
            None
        }
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two sensors a stream belongs to.
///
/// The surface sensor is local to the recording process; the in-water sensor
/// rides the remote vehicle and is reachable only over the tether link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorRole {
    /// Remote sensor on the vehicle, mirrored over HTTP
    Inwater,
    /// Local sensor, recorded directly
    Surface,
}

impl SensorRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inwater => "inwater",
            Self::Surface => "surface",
        }
    }

    /// The opposite role.
    pub fn other(self) -> Self {
        match self {
            Self::Inwater => Self::Surface,
            Self::Surface => Self::Inwater,
        }
    }
}

impl fmt::Display for SensorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        let id = SyncId(1_700_000_000_123);
        let marker = Reading::marker(Utc::now(), "probe-1", SYNC_START, id);
        assert!(marker.is_marker());
        assert_eq!(marker.sync_id(), Some(id));
    }

    #[test]
    fn test_data_reading_has_no_sync_id() {
        let reading = Reading {
            time: Utc::now(),
            sensor_id: "probe-1".into(),
            mode: "pH".into(),
            value: 7.01,
            temp_c: Some(21.5),
            vin: None,
        };
        assert!(!reading.is_marker());
        assert_eq!(reading.sync_id(), None);
    }

    #[test]
    fn test_sync_id_rejects_fractional_values() {
        assert_eq!(SyncId::from_value(1.5), None);
        assert_eq!(SyncId::from_value(f64::NAN), None);
        assert_eq!(SyncId::from_value(-3.0), None);
        assert_eq!(SyncId::from_value(42.0), Some(SyncId(42)));
    }

    #[test]
    fn test_role_serde_names() {
        let json = serde_json::to_string(&SensorRole::Inwater).unwrap();
        assert_eq!(json, "\"inwater\"");
        assert_eq!(SensorRole::Inwater.other(), SensorRole::Surface);
    }
}
