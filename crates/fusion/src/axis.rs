//! Consolidated timestamp axis.
//!
//! Both streams' (drift-corrected) timestamps are merged, sorted and
//! greedily clustered; each cluster becomes one output axis point.

use chrono::{DateTime, Utc};

use contracts::SensorRole;

/// Build the consolidated axis from tagged timestamps.
///
/// Consecutive timestamps whose gap from the cluster's first member stays
/// within `consolidation_ms` join one cluster. A cluster's representative
/// time is its first surface (local) timestamp if present, else the median
/// of the cluster.
pub fn build_axis(
    mut tagged: Vec<(DateTime<Utc>, SensorRole)>,
    consolidation_ms: f64,
) -> Vec<DateTime<Utc>> {
    tagged.sort_by_key(|(time, _)| *time);

    let mut axis = Vec::new();
    let mut cluster: Vec<(DateTime<Utc>, SensorRole)> = Vec::new();

    for (time, role) in tagged {
        let in_cluster = cluster
            .first()
            .map(|(first, _)| (time - *first).num_milliseconds() as f64 <= consolidation_ms)
            .unwrap_or(false);

        if !in_cluster && !cluster.is_empty() {
            axis.push(representative(&cluster));
            cluster.clear();
        }
        cluster.push((time, role));
    }
    if !cluster.is_empty() {
        axis.push(representative(&cluster));
    }

    axis
}

fn representative(cluster: &[(DateTime<Utc>, SensorRole)]) -> DateTime<Utc> {
    cluster
        .iter()
        .find(|(_, role)| *role == SensorRole::Surface)
        .map(|(time, _)| *time)
        .unwrap_or_else(|| cluster[cluster.len() / 2].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_close_timestamps_cluster_to_one_point() {
        let axis = build_axis(
            vec![
                (t(1_000), SensorRole::Inwater),
                (t(1_010), SensorRole::Surface),
                (t(1_020), SensorRole::Inwater),
            ],
            25.0,
        );
        // Representative is the first surface timestamp
        assert_eq!(axis, vec![t(1_010)]);
    }

    #[test]
    fn test_gap_beyond_threshold_splits_clusters() {
        let axis = build_axis(
            vec![
                (t(1_000), SensorRole::Surface),
                (t(1_100), SensorRole::Surface),
            ],
            25.0,
        );
        assert_eq!(axis, vec![t(1_000), t(1_100)]);
    }

    #[test]
    fn test_remote_only_cluster_uses_median() {
        let axis = build_axis(
            vec![
                (t(1_000), SensorRole::Inwater),
                (t(1_010), SensorRole::Inwater),
                (t(1_020), SensorRole::Inwater),
            ],
            25.0,
        );
        assert_eq!(axis, vec![t(1_010)]);
    }

    #[test]
    fn test_gap_is_measured_from_cluster_start() {
        // 1_000..1_040 in 20ms steps: 1_040 is 40ms from the cluster start,
        // so it opens a new cluster even though each step is only 20ms
        let axis = build_axis(
            vec![
                (t(1_000), SensorRole::Inwater),
                (t(1_020), SensorRole::Inwater),
                (t(1_040), SensorRole::Inwater),
            ],
            25.0,
        );
        assert_eq!(axis.len(), 2);
    }
}
