//! Tolerance-bounded matching of the two streams onto the consolidated axis.

use chrono::{DateTime, Utc};
use tracing::debug;

use contracts::{FusionConfig, Reading, SensorRole};

use crate::axis::build_axis;

/// One fused output row. A row carries one sensor, or both; a row with
/// neither is never produced.
#[derive(Debug, Clone)]
pub struct WideRow {
    pub time: DateTime<Utc>,
    pub inwater: Option<Reading>,
    pub surface: Option<Reading>,
}

/// Fuse the two ordered reading streams. In-water timestamps must already
/// be drift-corrected into the surface frame.
///
/// Every reading is matched at most once (per-sensor used sets), and a
/// lone single-sensor match next to a dual row is treated as an alignment
/// artifact and dropped unless it sits in a genuine data gap.
pub fn fuse(inwater: &[Reading], surface: &[Reading], config: &FusionConfig) -> Vec<WideRow> {
    let mut tagged: Vec<(DateTime<Utc>, SensorRole)> = Vec::new();
    tagged.extend(inwater.iter().map(|r| (r.time, SensorRole::Inwater)));
    tagged.extend(surface.iter().map(|r| (r.time, SensorRole::Surface)));
    let axis = build_axis(tagged, config.consolidation_ms);

    let mut inwater_used = vec![false; inwater.len()];
    let mut surface_used = vec![false; surface.len()];
    let mut last_inwater_match: Option<DateTime<Utc>> = None;
    let mut last_surface_match: Option<DateTime<Utc>> = None;
    let mut prev_row_single = false;

    let gap_ms = config.gap_factor * config.tolerance_ms;
    let mut rows = Vec::new();

    for time in axis {
        let iw = nearest_unused(inwater, &mut inwater_used, time, config.tolerance_ms);
        let sf = nearest_unused(surface, &mut surface_used, time, config.tolerance_ms);

        match (iw, sf) {
            (Some(iw), Some(sf)) => {
                last_inwater_match = Some(iw.time);
                last_surface_match = Some(sf.time);
                prev_row_single = false;
                rows.push(WideRow {
                    time,
                    inwater: Some(iw.clone()),
                    surface: Some(sf.clone()),
                });
            }
            (Some(iw), None) => {
                if in_gap(time, last_surface_match, gap_ms) || prev_row_single {
                    last_inwater_match = Some(iw.time);
                    prev_row_single = true;
                    rows.push(WideRow {
                        time,
                        inwater: Some(iw.clone()),
                        surface: None,
                    });
                } else {
                    debug!(time = %time, "Dropping lone in-water match next to a dual row");
                }
            }
            (None, Some(sf)) => {
                if in_gap(time, last_inwater_match, gap_ms) || prev_row_single {
                    last_surface_match = Some(sf.time);
                    prev_row_single = true;
                    rows.push(WideRow {
                        time,
                        inwater: None,
                        surface: Some(sf.clone()),
                    });
                } else {
                    debug!(time = %time, "Dropping lone surface match next to a dual row");
                }
            }
            (None, None) => {}
        }
    }

    rows
}

/// Whether the other sensor has been silent long enough for a
/// single-sensor row to represent a genuine data gap.
fn in_gap(time: DateTime<Utc>, last_other_match: Option<DateTime<Utc>>, gap_ms: f64) -> bool {
    last_other_match
        .map(|last| (time - last).num_milliseconds() as f64 > gap_ms)
        .unwrap_or(true)
}

/// Nearest not-yet-used reading within tolerance; marks it used.
fn nearest_unused<'a>(
    readings: &'a [Reading],
    used: &mut [bool],
    time: DateTime<Utc>,
    tolerance_ms: f64,
) -> Option<&'a Reading> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, reading) in readings.iter().enumerate() {
        if used[idx] {
            continue;
        }
        let distance = (reading.time - time).num_milliseconds().abs() as f64;
        if distance <= tolerance_ms && best.map(|(_, d)| distance < d).unwrap_or(true) {
            best = Some((idx, distance));
        }
    }
    best.map(|(idx, _)| {
        used[idx] = true;
        &readings[idx]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn reading(role: SensorRole, ms: i64, value: f64) -> Reading {
        Reading {
            time: t(ms),
            sensor_id: format!("{role}-ph"),
            mode: "pH".into(),
            value,
            temp_c: None,
            vin: None,
        }
    }

    fn config(tolerance_ms: f64, consolidation_ms: f64) -> FusionConfig {
        FusionConfig {
            tolerance_ms,
            consolidation_ms,
            gap_factor: 2.0,
        }
    }

    #[test]
    fn test_dual_streams_fuse_by_position() {
        let surface = vec![
            reading(SensorRole::Surface, 0, 1.0),
            reading(SensorRole::Surface, 60_000, 2.0),
            reading(SensorRole::Surface, 120_000, 3.0),
        ];
        let inwater = vec![
            reading(SensorRole::Inwater, 0, 10.0),
            reading(SensorRole::Inwater, 60_010, 20.0),
            reading(SensorRole::Inwater, 119_990, 30.0),
        ];

        let rows = fuse(&inwater, &surface, &config(50.0, 25.0));
        assert_eq!(rows.len(), 3);
        for (row, (iw, sf)) in rows.iter().zip([(10.0, 1.0), (20.0, 2.0), (30.0, 3.0)]) {
            assert_eq!(row.inwater.as_ref().unwrap().value, iw);
            assert_eq!(row.surface.as_ref().unwrap().value, sf);
        }
    }

    #[test]
    fn test_reading_never_reused_and_lone_neighbor_dropped() {
        // Two in-water readings 10ms apart with one surface reading between
        // them: the surface reading joins exactly one row, and the leftover
        // in-water reading sits too close to that row to stand alone.
        let inwater = vec![
            reading(SensorRole::Inwater, 100_000, 10.0),
            reading(SensorRole::Inwater, 100_010, 11.0),
        ];
        let surface = vec![reading(SensorRole::Surface, 100_005, 1.0)];

        let rows = fuse(&inwater, &surface, &config(50.0, 5.0));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].surface.is_some());
        assert!(rows[0].inwater.is_some());
    }

    #[test]
    fn test_genuine_gap_emits_single_sensor_row() {
        let inwater = vec![
            reading(SensorRole::Inwater, 100_000, 10.0),
            // 500ms after the surface sensor's last match: a real gap
            reading(SensorRole::Inwater, 100_500, 11.0),
        ];
        let surface = vec![reading(SensorRole::Surface, 100_005, 1.0)];

        let rows = fuse(&inwater, &surface, &config(50.0, 25.0));
        assert_eq!(rows.len(), 2);
        assert!(rows[0].surface.is_some() && rows[0].inwater.is_some());
        assert!(rows[1].surface.is_none());
        assert_eq!(rows[1].inwater.as_ref().unwrap().value, 11.0);
    }

    #[test]
    fn test_gap_is_not_fragmented_into_lone_rows() {
        // Once a gap opens, consecutive single-sensor rows keep flowing
        let inwater = vec![
            reading(SensorRole::Inwater, 100_000, 10.0),
            reading(SensorRole::Inwater, 100_500, 11.0),
            reading(SensorRole::Inwater, 100_560, 12.0),
        ];
        let surface = vec![reading(SensorRole::Surface, 100_005, 1.0)];

        let rows = fuse(&inwater, &surface, &config(50.0, 25.0));
        assert_eq!(rows.len(), 3);
        // 100_560 is within the gap window of nothing surface-side matched
        // since 100_005, and follows a single-sensor row
        assert!(rows[2].surface.is_none());
    }

    #[test]
    fn test_output_only_contains_input_values() {
        let inwater = vec![reading(SensorRole::Inwater, 0, 10.0)];
        let surface = vec![reading(SensorRole::Surface, 5, 1.0)];

        let rows = fuse(&inwater, &surface, &config(50.0, 25.0));
        for row in &rows {
            if let Some(r) = &row.inwater {
                assert!(inwater.contains(r));
            }
            if let Some(r) = &row.surface {
                assert!(surface.contains(r));
            }
        }
    }

    #[test]
    fn test_empty_inputs_fuse_to_nothing() {
        assert!(fuse(&[], &[], &config(50.0, 25.0)).is_empty());
    }
}
