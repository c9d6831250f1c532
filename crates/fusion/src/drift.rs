//! Clock-drift estimation from recovered sync markers.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use contracts::{
    DriftModel, MarkerQuality, MarkerType, Reading, SyncMarker, SyncId, SYNC_START, SYNC_STOP,
};

/// Noise floor below which measured drift collapses to a constant offset.
const LINEAR_NOISE_FLOOR_MS: f64 = 2.0;

/// START/STOP marker timestamps recovered from one session file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveredMarkers {
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
    pub sync_id: Option<SyncId>,
}

impl RecoveredMarkers {
    /// Extract marker endpoints from the marker rows of a parsed session.
    /// The first START and the last STOP win if duplicates slipped in.
    pub fn from_readings(markers: &[Reading]) -> Self {
        let mut recovered = Self::default();
        for marker in markers {
            match marker.mode.as_str() {
                SYNC_START if recovered.start.is_none() => {
                    recovered.start = Some(marker.time);
                    recovered.sync_id = recovered.sync_id.or_else(|| marker.sync_id());
                }
                SYNC_STOP => {
                    recovered.stop = Some(marker.time);
                    recovered.sync_id = recovered.sync_id.or_else(|| marker.sync_id());
                }
                _ => {}
            }
        }
        recovered
    }
}

/// Outcome of drift estimation: the chosen model (if any) plus the marker
/// records to persist in the sync metadata.
#[derive(Debug, Clone)]
pub struct DriftEstimate {
    pub model: Option<DriftModel>,
    pub markers: Vec<SyncMarker>,
}

fn offset_ms(local: DateTime<Utc>, remote: DateTime<Utc>) -> f64 {
    (remote - local).num_milliseconds() as f64
}

/// Choose a drift model for the session, first applicable rung wins:
///
/// 1. START+STOP paired on both sides: measure offsets at both endpoints;
///    within the noise floor collapse to `Constant`, otherwise `Linear`.
/// 2. One STOP missing but a coarse offset exists: synthesize the missing
///    endpoint from the coarse offset, then as (1).
/// 3. Paired STARTs only: `Constant` from the measured start offset;
///    failing that, a coarse offset alone gives `Constant`.
/// 4. Nothing usable: no correction, fusion proceeds on raw timestamps.
pub fn estimate(
    local: &RecoveredMarkers,
    remote: &RecoveredMarkers,
    coarse_offset_ms: Option<f64>,
) -> DriftEstimate {
    let sync_id = local.sync_id.or(remote.sync_id).unwrap_or_else(SyncId::generate);
    let mut markers = Vec::new();
    let mut stop_quality = MarkerQuality::Measured;

    if let (Some(ls), Some(rs)) = (local.start, remote.start) {
        markers.push(SyncMarker {
            sync_id,
            marker_type: MarkerType::Start,
            local_timestamp: Some(ls),
            remote_timestamp: Some(rs),
            offset_ms: Some(offset_ms(ls, rs)),
            quality: MarkerQuality::Measured,
        });
    }

    // Rung 2: synthesize a missing stop endpoint from the coarse offset
    let (local_stop, remote_stop) = match (local.stop, remote.stop, coarse_offset_ms) {
        (Some(ls), Some(rs), _) => (Some(ls), Some(rs)),
        (Some(ls), None, Some(coarse)) => {
            stop_quality = MarkerQuality::Synthetic;
            (
                Some(ls),
                Some(ls + chrono::Duration::milliseconds(coarse.round() as i64)),
            )
        }
        (None, Some(rs), Some(coarse)) => {
            stop_quality = MarkerQuality::Synthetic;
            (
                Some(rs - chrono::Duration::milliseconds(coarse.round() as i64)),
                Some(rs),
            )
        }
        _ => (local.stop, remote.stop),
    };

    if let (Some(ls), Some(rs)) = (local_stop, remote_stop) {
        markers.push(SyncMarker {
            sync_id,
            marker_type: MarkerType::Stop,
            local_timestamp: Some(ls),
            remote_timestamp: Some(rs),
            offset_ms: Some(offset_ms(ls, rs)),
            quality: stop_quality,
        });
    }

    // Rung 1 (possibly with a synthesized endpoint from rung 2)
    if let (Some(local_start), Some(remote_start), Some(ls), Some(rs)) =
        (local.start, remote.start, local_stop, remote_stop)
    {
        let start_offset = offset_ms(local_start, remote_start);
        let end_offset = offset_ms(ls, rs);
        let duration_ms = (ls - local_start).num_milliseconds() as f64;

        let model = if (end_offset - start_offset).abs() < LINEAR_NOISE_FLOOR_MS
            || duration_ms <= 0.0
        {
            DriftModel::Constant {
                offset_ms: (start_offset + end_offset) / 2.0,
            }
        } else {
            DriftModel::Linear {
                start_offset_ms: start_offset,
                end_offset_ms: end_offset,
                drift_rate_per_ms: (end_offset - start_offset) / duration_ms,
                reference_time: local_start,
            }
        };
        debug!(model = ?model, "Drift model from paired markers");
        return DriftEstimate {
            model: Some(model),
            markers,
        };
    }

    // Rung 3: paired starts, else coarse offset alone
    if let (Some(ls), Some(rs)) = (local.start, remote.start) {
        return DriftEstimate {
            model: Some(DriftModel::Constant {
                offset_ms: offset_ms(ls, rs),
            }),
            markers,
        };
    }
    if let Some(coarse) = coarse_offset_ms {
        return DriftEstimate {
            model: Some(DriftModel::Constant { offset_ms: coarse }),
            markers,
        };
    }

    // Rung 4
    warn!("No markers or coarse offset available; fusing on raw timestamps");
    DriftEstimate {
        model: None,
        markers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn recovered(start: i64, stop: i64) -> RecoveredMarkers {
        RecoveredMarkers {
            start: Some(t(start)),
            stop: Some(t(stop)),
            sync_id: Some(SyncId(7)),
        }
    }

    #[test]
    fn test_measurable_drift_selects_linear() {
        // Remote clock gains 50ms over a 100s session
        let estimate = estimate(&recovered(0, 100_000), &recovered(0, 100_050), None);

        match estimate.model.unwrap() {
            DriftModel::Linear {
                start_offset_ms,
                end_offset_ms,
                drift_rate_per_ms,
                reference_time,
            } => {
                assert_eq!(start_offset_ms, 0.0);
                assert_eq!(end_offset_ms, 50.0);
                assert!((drift_rate_per_ms - 0.0005).abs() < 1e-9);
                assert_eq!(reference_time, t(0));
            }
            other => panic!("expected Linear, got {other:?}"),
        }
        assert_eq!(estimate.markers.len(), 2);
    }

    #[test]
    fn test_sub_noise_floor_drift_collapses_to_constant() {
        // Offsets agree within 1ms at both ends
        let estimate = estimate(&recovered(0, 100_000), &recovered(10, 100_011), None);

        match estimate.model.unwrap() {
            DriftModel::Constant { offset_ms } => assert!((offset_ms - 10.5).abs() < 1e-9),
            other => panic!("expected Constant, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_stop_synthesized_from_coarse_offset() {
        let local = recovered(0, 100_000);
        let remote = RecoveredMarkers {
            start: Some(t(10)),
            stop: None,
            sync_id: Some(SyncId(7)),
        };

        let estimate = estimate(&local, &remote, Some(10.0));
        assert!(matches!(
            estimate.model,
            Some(DriftModel::Constant { .. })
        ));
        let stop = estimate
            .markers
            .iter()
            .find(|m| m.marker_type == MarkerType::Stop)
            .unwrap();
        assert_eq!(stop.quality, MarkerQuality::Synthetic);
        assert_eq!(stop.remote_timestamp, Some(t(100_010)));
    }

    #[test]
    fn test_starts_only_give_constant_from_start_offset() {
        let local = RecoveredMarkers {
            start: Some(t(0)),
            stop: None,
            sync_id: None,
        };
        let remote = RecoveredMarkers {
            start: Some(t(25)),
            stop: None,
            sync_id: None,
        };

        let estimate = estimate(&local, &remote, None);
        assert_eq!(
            estimate.model,
            Some(DriftModel::Constant { offset_ms: 25.0 })
        );
    }

    #[test]
    fn test_coarse_offset_alone_gives_constant() {
        let estimate = estimate(
            &RecoveredMarkers::default(),
            &RecoveredMarkers::default(),
            Some(-40.0),
        );
        assert_eq!(
            estimate.model,
            Some(DriftModel::Constant { offset_ms: -40.0 })
        );
        assert!(estimate.markers.is_empty());
    }

    #[test]
    fn test_nothing_available_gives_no_model() {
        let estimate = estimate(
            &RecoveredMarkers::default(),
            &RecoveredMarkers::default(),
            None,
        );
        assert!(estimate.model.is_none());
    }

    #[test]
    fn test_markers_recovered_from_rows() {
        let markers = vec![
            Reading::marker(t(100), "probe", SYNC_START, SyncId(9)),
            Reading::marker(t(5_000), "probe", SYNC_STOP, SyncId(9)),
        ];
        let recovered = RecoveredMarkers::from_readings(&markers);
        assert_eq!(recovered.start, Some(t(100)));
        assert_eq!(recovered.stop, Some(t(5_000)));
        assert_eq!(recovered.sync_id, Some(SyncId(9)));
    }
}
