//! Mock Mission Demo
//!
//! Runs the full record -> mirror -> fuse pipeline in one process, with a
//! synthetic surface probe and an in-memory peer standing in for the
//! in-water sensor. No hardware or network required.
//!
//! Run with: cargo run --bin mock_mission

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use contracts::{
    FusionConfig, Reading, SensorRecord, SensorRole, SensorState, SyncId, SYNC_START, SYNC_STOP,
};
use replication::{start_mirror, MirrorConfig, MockPeerClient};
use session_store::{
    render_row, start_session, SessionConfig, SessionSummary, StoreError, SyncMetadataStore,
    CSV_HEADER,
};

const MISSION: &str = "dive-demo";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Mission Demo");

    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let pair_dir = std::env::temp_dir().join(format!("{MISSION}_{stamp}"));
    std::fs::create_dir_all(&pair_dir)?;
    let meta_store = SyncMetadataStore::new(&pair_dir);
    let sync_id = SyncId::generate();

    // ==== Stage 1: Record the surface session ====
    tracing::info!(pair_dir = %pair_dir.display(), "Recording surface session");

    let session = start_session(&pair_dir, "surface-ph", MISSION, SessionConfig::default()).await?;
    let start = Utc::now();
    session
        .add_reading(Reading::marker(start, "surface-ph", SYNC_START, sync_id))
        .await?;
    for i in 0..20i64 {
        session
            .add_reading(surface_reading(start, i))
            .await?;
    }
    let stop_marker = Reading::marker(
        start + ChronoDuration::milliseconds(10_000),
        "surface-ph",
        SYNC_STOP,
        sync_id,
    );
    let local = session.stop(Some(stop_marker)).await?;
    record_sensor(&meta_store, SensorRole::Surface, &local)?;
    tracing::info!(
        rows = local.rows,
        verified = local.verified,
        "Surface session finalized"
    );

    // ==== Stage 2: Mirror the in-water peer (mock) ====
    tracing::info!("Mirroring in-water session from mock peer");

    let peer = MockPeerClient::new();
    peer.publish_chunk(0, &remote_chunk(start, sync_id));

    let remote_session_id = format!("{MISSION}_rov-ph_{stamp}");
    let mirror = start_mirror(
        &remote_session_id,
        "rov-ph",
        MISSION,
        peer.clone(),
        &pair_dir.join(&remote_session_id),
        MirrorConfig {
            cadence: Duration::from_secs(30),
            finalize_grace: Duration::from_millis(50),
        },
    )
    .await?;
    let remote = mirror.stop().await?;
    record_sensor(&meta_store, SensorRole::Inwater, &remote)?;
    tracing::info!(rows = remote.rows, "In-water session mirrored");

    // ==== Stage 3: Fuse the pair ====
    let report = fusion::run_fusion(&pair_dir, &FusionConfig::default(), None)?;
    tracing::info!(status = ?report.status, rows = report.rows, "Fusion finished");

    if let Some(output) = &report.output_file {
        println!("Unified output: {}", output.display());
    }
    println!("Session pair: {}", pair_dir.display());

    Ok(())
}

fn surface_reading(start: DateTime<Utc>, i: i64) -> Reading {
    Reading {
        time: start + ChronoDuration::milliseconds(i * 500),
        sensor_id: "surface-ph".into(),
        mode: "pH".into(),
        value: 8.1 + 0.01 * (i as f64 * 0.6).sin(),
        temp_c: Some(18.0),
        vin: Some(12.4),
    }
}

/// The in-water stream, running 50ms ahead of the surface clock.
fn remote_chunk(start: DateTime<Utc>, sync_id: SyncId) -> String {
    let mut rows = vec![Reading::marker(
        start + ChronoDuration::milliseconds(50),
        "rov-ph",
        SYNC_START,
        sync_id,
    )];
    for i in 0..20i64 {
        rows.push(Reading {
            time: start + ChronoDuration::milliseconds(i * 500 + 50),
            sensor_id: "rov-ph".into(),
            mode: "pH".into(),
            value: 7.9 + 0.01 * (i as f64 * 0.6).cos(),
            temp_c: Some(11.5),
            vin: Some(14.8),
        });
    }
    rows.push(Reading::marker(
        start + ChronoDuration::milliseconds(10_050),
        "rov-ph",
        SYNC_STOP,
        sync_id,
    ));

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
) -> Result<(), StoreError> {
    let state = if summary.verified {
        SensorState::Complete
    } else {
        SensorState::Degraded
    };
    store.update(MISSION, |meta| {
        meta.sensors.insert(
            role,
            SensorRecord {
                session_id: summary.session_id.clone(),
                state,
                rows: summary.rows,
                bytes: summary.bytes,
            },
        );
    })?;
    Ok(())
}
