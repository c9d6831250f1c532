//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    mission: String,
    storage: StorageInfo,
    sensors: SensorsInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    tuning: Option<TuningInfo>,
}

#[derive(Serialize)]
struct StorageInfo {
    root_dir: String,
    exists: bool,
}

#[derive(Serialize)]
struct SensorsInfo {
    local: String,
    remote: String,
    peer_url: String,
}

#[derive(Serialize)]
struct TuningInfo {
    recording: RecordingInfo,
    replication: ReplicationInfo,
    fusion: FusionInfo,
}

#[derive(Serialize)]
struct RecordingInfo {
    flush_interval_ms: u64,
    roll_interval_secs: u64,
    buffer_ceiling: usize,
}

#[derive(Serialize)]
struct ReplicationInfo {
    cadence_secs: u64,
    full_bandwidth_cadence_secs: u64,
    full_bandwidth: bool,
    request_timeout_secs: u64,
}

#[derive(Serialize)]
struct FusionInfo {
    tolerance_ms: f64,
    consolidation_ms: f64,
    gap_factor: f64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &contracts::MissionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let tuning = if args.tuning {
        Some(TuningInfo {
            recording: RecordingInfo {
                flush_interval_ms: blueprint.recording.flush_interval_ms,
                roll_interval_secs: blueprint.recording.roll_interval_secs,
                buffer_ceiling: blueprint.recording.buffer_ceiling,
            },
            replication: ReplicationInfo {
                cadence_secs: blueprint.replication.cadence_secs,
                full_bandwidth_cadence_secs: blueprint.replication.full_bandwidth_cadence_secs,
                full_bandwidth: blueprint.replication.full_bandwidth,
                request_timeout_secs: blueprint.replication.request_timeout_secs,
            },
            fusion: FusionInfo {
                tolerance_ms: blueprint.fusion.tolerance_ms,
                consolidation_ms: blueprint.fusion.consolidation_ms,
                gap_factor: blueprint.fusion.gap_factor,
            },
        })
    } else {
        None
    };

    ConfigInfo {
        mission: blueprint.mission.label.clone(),
        storage: StorageInfo {
            root_dir: blueprint.storage.root_dir.clone(),
            exists: std::path::Path::new(&blueprint.storage.root_dir).is_dir(),
        },
        sensors: SensorsInfo {
            local: blueprint.sensors.local.sensor_id.clone(),
            remote: blueprint.sensors.remote.sensor_id.clone(),
            peer_url: blueprint.sensors.remote.base_url.clone(),
        },
        tuning,
    }
}

fn print_config_info(blueprint: &contracts::MissionBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Hydro Syncer Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Mission
    println!("🌊 Mission");
    println!("   ├─ Label: {}", blueprint.mission.label);
    let storage_exists = std::path::Path::new(&blueprint.storage.root_dir).is_dir();
    println!(
        "   └─ Storage root: {}{}",
        blueprint.storage.root_dir,
        if storage_exists { "" } else { " (not created yet)" }
    );

    // Sensors
    println!("\n📡 Sensors");
    println!(
        "   ├─ Local (surface): {}",
        blueprint.sensors.local.sensor_id
    );
    println!(
        "   └─ Remote (in-water): {} via {}",
        blueprint.sensors.remote.sensor_id, blueprint.sensors.remote.base_url
    );

    // Tuning
    if args.tuning {
        println!("\n⚙️  Recording");
        println!(
            "   ├─ Flush interval: {}ms",
            blueprint.recording.flush_interval_ms
        );
        println!(
            "   ├─ Roll interval: {}s",
            blueprint.recording.roll_interval_secs
        );
        println!("   └─ Buffer ceiling: {}", blueprint.recording.buffer_ceiling);

        println!("\n🔁 Replication");
        println!("   ├─ Cadence: {}s", blueprint.replication.cadence_secs);
        println!(
            "   ├─ Full-bandwidth cadence: {}s",
            blueprint.replication.full_bandwidth_cadence_secs
        );
        println!(
            "   ├─ Full-bandwidth on start: {}",
            blueprint.replication.full_bandwidth
        );
        println!(
            "   └─ Request timeout: {}s",
            blueprint.replication.request_timeout_secs
        );

        println!("\n🔀 Fusion");
        println!("   ├─ Tolerance: {}ms", blueprint.fusion.tolerance_ms);
        println!(
            "   ├─ Consolidation: {}ms",
            blueprint.fusion.consolidation_ms
        );
        println!("   └─ Gap factor: {}", blueprint.fusion.gap_factor);
    }

    println!();
}
