//! # Integration Tests
//!
//! End-to-end tests across the workspace crates:
//! - full record / mirror / fuse round trip over a session pair
//! - single-sensor missions
//! - replication behavior under peer failures

#[cfg(test)]
mod contract_tests {
    use contracts::{Reading, SyncId, SYNC_START};
    use session_store::{parse_row, render_row};

    #[test]
    fn test_marker_rows_survive_the_csv_format() {
        let time = chrono::Utc::now();
        let marker = Reading::marker(time, "surface-ph", SYNC_START, SyncId(1_700_000_000_123));

        let row = render_row(&marker);
        let back = parse_row(&row, 1).unwrap();
        assert!(back.is_marker());
        assert_eq!(back.sync_id(), Some(SyncId(1_700_000_000_123)));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use contracts::{
        DriftModel, FusionConfig, FusionStatus, Reading, SensorRecord, SensorRole, SensorState,
        SyncId, SYNC_START, SYNC_STOP,
    };
    use fusion::unified_file_name;
    use observability::MissionStatsAggregator;
    use replication::{start_mirror, MirrorConfig, MockPeerClient};
    use session_store::{
        load_manifest, read_session_file, render_row, start_session, SessionConfig,
        SessionSummary, SyncMetadataStore, CSV_HEADER,
    };

    const MISSION: &str = "dive-12";
    const SYNC: SyncId = SyncId(42);

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn reading(time: DateTime<Utc>, sensor_id: &str, value: f64) -> Reading {
        Reading {
            time,
            sensor_id: sensor_id.into(),
            mode: "pH".into(),
            value,
            temp_c: Some(18.3),
            vin: Some(12.4),
        }
    }

    fn fast_session_config() -> SessionConfig {
        SessionConfig {
            flush_interval: Duration::from_millis(5),
            roll_interval: Duration::from_secs(3600),
            buffer_ceiling: 10_000,
        }
    }

    fn fast_mirror_config() -> MirrorConfig {
        MirrorConfig {
            cadence: Duration::from_secs(3600),
            finalize_grace: Duration::from_millis(10),
        }
    }

    /// Remote chunk content: the in-water stream runs 50ms ahead of the
    /// surface clock, bracketed by the shared sync markers.
    fn remote_chunk_content() -> String {
        let rows = [
            Reading::marker(t(50), "rov-ph", SYNC_START, SYNC),
            reading(t(10_050), "rov-ph", 7.90),
            reading(t(70_050), "rov-ph", 7.92),
            reading(t(130_050), "rov-ph", 7.94),
            Reading::marker(t(200_050), "rov-ph", SYNC_STOP, SYNC),
        ];
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for row in &rows {
            out.push_str(&render_row(row));
            out.push('\n');
        }
        out
    }

    fn record_sensor(
        store: &SyncMetadataStore,
        role: SensorRole,
        summary: &SessionSummary,
    ) {
        let state = if summary.verified {
            SensorState::Complete
        } else {
            SensorState::Degraded
        };
        store
            .update(MISSION, |m| {
                m.sensors.insert(
                    role,
                    SensorRecord {
                        session_id: summary.session_id.clone(),
                        state,
                        rows: summary.rows,
                        bytes: summary.bytes,
                    },
                );
            })
            .unwrap();
    }

    /// Record the surface session with deterministic timestamps.
    async fn record_surface_session(pair_dir: &Path) -> SessionSummary {
        let handle = start_session(pair_dir, "surface-ph", MISSION, fast_session_config())
            .await
            .unwrap();

        handle
            .add_reading(Reading::marker(t(0), "surface-ph", SYNC_START, SYNC))
            .await
            .unwrap();
        for (ms, value) in [(10_000, 8.10), (70_000, 8.12), (130_000, 8.14)] {
            handle
                .add_reading(reading(t(ms), "surface-ph", value))
                .await
                .unwrap();
        }

        let stop = Reading::marker(t(200_000), "surface-ph", SYNC_STOP, SYNC);
        handle.stop(Some(stop)).await.unwrap()
    }

    /// Full round trip: record surface locally, mirror the in-water peer,
    /// fuse the pair, inspect the unified output and metadata.
    #[tokio::test]
    async fn test_record_mirror_fuse_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let pair_dir = root.path();
        let meta_store = SyncMetadataStore::new(pair_dir);

        // Surface side
        let local = record_surface_session(pair_dir).await;
        assert!(local.verified);
        assert_eq!(local.rows, 5);
        record_sensor(&meta_store, SensorRole::Surface, &local);

        // The manifest pins the combined file's hash
        let manifest = load_manifest(&pair_dir.join(&local.session_id)).unwrap();
        assert_eq!(
            manifest.session_sha256.as_deref(),
            Some(integrity::hash_file(&local.session_file).unwrap().as_str())
        );

        // Recording aggregates separate markers from measurements
        let parsed = read_session_file(&local.session_file).unwrap();
        let mut stats = MissionStatsAggregator::new();
        for row in parsed.readings.iter().chain(parsed.markers.iter()) {
            stats.update(row);
        }
        let summary = stats.summary();
        assert_eq!(summary.total_readings, 3);
        assert_eq!(summary.total_markers, 2);

        // In-water side, mirrored over the mock peer
        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &remote_chunk_content());

        let remote_session_id = format!("{MISSION}_rov-ph_20240601120000");
        let mirror = start_mirror(
            &remote_session_id,
            "rov-ph",
            MISSION,
            peer.clone(),
            &pair_dir.join(&remote_session_id),
            fast_mirror_config(),
        )
        .await
        .unwrap();
        let remote = mirror.stop().await.unwrap();
        assert!(remote.verified);
        assert_eq!(remote.rows, 5);
        record_sensor(&meta_store, SensorRole::Inwater, &remote);

        // Both sides complete: fuse
        let doc = meta_store.load().unwrap().unwrap();
        assert!(doc.both_complete());

        let report = fusion::run_fusion(pair_dir, &FusionConfig::default(), None).unwrap();
        assert_eq!(report.status, FusionStatus::Complete);
        assert_eq!(report.rows, 3, "three dual-sensor rows");

        // Unified output: header plus one row per matched pair, both
        // sensors present on every row
        let output = pair_dir.join(unified_file_name(MISSION));
        assert_eq!(report.output_file.as_deref(), Some(output.as_path()));
        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("timestamp,inwater_sensor_id"));
        for line in &lines[1..] {
            assert!(line.contains("surface-ph"), "row missing surface: {line}");
            assert!(line.contains("rov-ph"), "row missing in-water: {line}");
        }
        assert!(content.contains("8.1"));
        assert!(content.contains("7.9"));

        // Metadata: paired markers recovered, measured 50ms constant offset
        let doc = meta_store.load().unwrap().unwrap();
        assert_eq!(doc.fusion.status, FusionStatus::Complete);
        assert_eq!(doc.fusion.rows, 3);
        assert_eq!(doc.markers.len(), 2);
        match doc.drift_model {
            Some(DriftModel::Constant { offset_ms }) => {
                assert!((offset_ms - 50.0).abs() < 1e-6, "got {offset_ms}")
            }
            other => panic!("expected constant model, got {other:?}"),
        }
    }

    /// A mission where only the surface recorded is an expected operating
    /// mode: fusion is skipped and no unified file appears.
    #[tokio::test]
    async fn test_single_sensor_mission_skips_fusion() {
        let root = tempfile::tempdir().unwrap();
        let pair_dir = root.path();
        let meta_store = SyncMetadataStore::new(pair_dir);

        let local = record_surface_session(pair_dir).await;
        record_sensor(&meta_store, SensorRole::Surface, &local);

        let report = fusion::run_fusion(pair_dir, &FusionConfig::default(), None).unwrap();
        assert_eq!(report.status, FusionStatus::Skipped);
        assert!(!pair_dir.join(unified_file_name(MISSION)).exists());

        let doc = meta_store.load().unwrap().unwrap();
        assert_eq!(doc.fusion.status, FusionStatus::Skipped);
    }

    /// A peer that fails its catalog endpoint at startup only delays the
    /// mirror; the final poll on stop still retrieves everything.
    #[tokio::test]
    async fn test_mirror_recovers_from_startup_catalog_failure() {
        let root = tempfile::tempdir().unwrap();

        let peer = MockPeerClient::new();
        peer.publish_chunk(0, &remote_chunk_content());
        peer.fail_next_catalog();

        let mirror = start_mirror(
            "dive-12_rov-ph_20240601120000",
            "rov-ph",
            MISSION,
            peer.clone(),
            &root.path().join("mirror"),
            fast_mirror_config(),
        )
        .await
        .unwrap();

        let summary = mirror.stop().await.unwrap();
        assert!(summary.verified);
        assert_eq!(summary.rows, 5);

        // Startup poll failed, final poll succeeded; the chunk moved once
        assert_eq!(peer.catalog_fetches(), 2);
        assert_eq!(peer.chunk_fetches(), 1);

        let parsed = read_session_file(&summary.session_file).unwrap();
        assert_eq!(parsed.readings.len(), 3);
        assert_eq!(parsed.markers.len(), 2);
    }
}

#[cfg(test)]
mod config_flow_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use replication::MirrorConfig;
    use session_store::SessionConfig;

    const MISSION_TOML: &str = r#"
[mission]
label = "dive-12"

[storage]
root_dir = "/data/missions"

[sensors.local]
sensor_id = "surface-ph"

[sensors.remote]
sensor_id = "rov-ph"
base_url = "http://192.168.2.2:8090"

[recording]
flush_interval_ms = 100
roll_interval_secs = 30
buffer_ceiling = 5000

[replication]
cadence_secs = 20
full_bandwidth_cadence_secs = 1
full_bandwidth = true
"#;

    /// Blueprint tuning sections flow into the runtime configs unchanged.
    #[test]
    fn test_blueprint_tuning_drives_runtime_configs() {
        let blueprint = ConfigLoader::load_from_str(MISSION_TOML, ConfigFormat::Toml).unwrap();

        let session = SessionConfig::from(&blueprint.recording);
        assert_eq!(session.flush_interval, Duration::from_millis(100));
        assert_eq!(session.roll_interval, Duration::from_secs(30));
        assert_eq!(session.buffer_ceiling, 5000);

        // Full-bandwidth mode selects the faster poll cadence
        let mirror = MirrorConfig::from(&blueprint.replication);
        assert_eq!(mirror.cadence, Duration::from_secs(1));
    }
}
