//! Recording metrics collection.
//!
//! Operation-site counters live next to the operations themselves; this
//! module holds the cross-cutting helpers and the in-memory aggregator
//! used for end-of-mission summaries.

use std::collections::HashMap;

use contracts::{FusionStatus, Reading};
use metrics::{counter, gauge, histogram};

/// Record one captured reading.
pub fn record_reading_captured(sensor_id: &str, mode: &str) {
    counter!(
        "hydro_syncer_readings_total",
        "sensor_id" => sensor_id.to_string(),
        "mode" => mode.to_string()
    )
    .increment(1);
}

/// Record a terminal fusion outcome.
pub fn record_fusion_outcome(status: FusionStatus, rows: u64) {
    let status = match status {
        FusionStatus::Pending => "pending",
        FusionStatus::Complete => "complete",
        FusionStatus::Skipped => "skipped",
        FusionStatus::Failed => "failed",
    };
    counter!("hydro_syncer_fusion_runs_total", "status" => status).increment(1);
    if rows > 0 {
        histogram!("hydro_syncer_fusion_rows").record(rows as f64);
    }
    gauge!("hydro_syncer_fusion_last_rows").set(rows as f64);
}

/// In-memory recording statistics per mission run.
///
/// Aggregates per-sensor counts and value distributions for the
/// end-of-run summary printed by the CLI.
#[derive(Debug, Clone, Default)]
pub struct MissionStatsAggregator {
    /// Readings per sensor
    pub reading_counts: HashMap<String, u64>,

    /// Marker rows per sensor
    pub marker_counts: HashMap<String, u64>,

    /// Value distribution per sensor
    pub value_stats: HashMap<String, RunningStats>,
}

impl MissionStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one captured reading into the aggregate.
    pub fn update(&mut self, reading: &Reading) {
        if reading.is_marker() {
            *self
                .marker_counts
                .entry(reading.sensor_id.clone())
                .or_insert(0) += 1;
            return;
        }
        *self
            .reading_counts
            .entry(reading.sensor_id.clone())
            .or_insert(0) += 1;
        self.value_stats
            .entry(reading.sensor_id.clone())
            .or_default()
            .push(reading.value);
    }

    /// Produce the summary report.
    pub fn summary(&self) -> MissionSummary {
        MissionSummary {
            total_readings: self.reading_counts.values().sum(),
            total_markers: self.marker_counts.values().sum(),
            reading_counts: self.reading_counts.clone(),
            value_stats: self
                .value_stats
                .iter()
                .map(|(id, stats)| (id.clone(), StatsSummary::from(stats)))
                .collect(),
        }
    }

    /// Reset all aggregates.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mission summary report
#[derive(Debug, Clone, Default)]
pub struct MissionSummary {
    pub total_readings: u64,
    pub total_markers: u64,
    pub reading_counts: HashMap<String, u64>,
    pub value_stats: HashMap<String, StatsSummary>,
}

impl std::fmt::Display for MissionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Mission Recording Summary ===")?;
        writeln!(f, "Total readings: {}", self.total_readings)?;
        writeln!(f, "Sync markers: {}", self.total_markers)?;

        let mut sensors: Vec<_> = self.reading_counts.keys().collect();
        sensors.sort();
        for sensor in sensors {
            let count = self.reading_counts[sensor];
            match self.value_stats.get(sensor) {
                Some(stats) => writeln!(f, "  {sensor}: {count} readings, value {stats}")?,
                None => writeln!(f, "  {sensor}: {count} readings")?,
            }
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics accumulator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean value
    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum value
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum value
    pub fn max(&self) -> f64 {
        self.max
    }
}
