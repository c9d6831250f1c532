//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::pipeline::{MissionConfig, MissionRunner};

/// Execute the `run` command
pub async fn run_mission(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if args.full_bandwidth {
        info!("Full-bandwidth replication requested from CLI");
        blueprint.replication.full_bandwidth = true;
    }

    info!(
        mission = %blueprint.mission.label,
        local_sensor = %blueprint.sensors.local.sensor_id,
        remote_sensor = %blueprint.sensors.remote.sensor_id,
        peer = %blueprint.sensors.remote.base_url,
        offline = args.offline,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    // Build mission configuration
    let mission_config = MissionConfig {
        blueprint,
        duration: if args.duration == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration))
        },
        offline: args.offline,
        frequency_hz: args.frequency,
        coarse_offset_ms: args.coarse_offset_ms,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let runner = MissionRunner::new(mission_config);

    info!("Starting mission...");

    let stats = runner
        .run(setup_shutdown_signal())
        .await
        .context("Mission execution failed")?;

    stats.print_summary();
    info!("Hydro Syncer finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::MissionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Mission: {}", blueprint.mission.label);
    println!("Storage root: {}", blueprint.storage.root_dir);
    println!("\nSensors:");
    println!("  - local (surface): {}", blueprint.sensors.local.sensor_id);
    println!(
        "  - remote (in-water): {} via {}",
        blueprint.sensors.remote.sensor_id, blueprint.sensors.remote.base_url
    );
    println!("\nRecording:");
    println!(
        "  flush {}ms, roll {}s, buffer ceiling {}",
        blueprint.recording.flush_interval_ms,
        blueprint.recording.roll_interval_secs,
        blueprint.recording.buffer_ceiling
    );
    println!("\nReplication:");
    println!(
        "  cadence {}s (full-bandwidth {}s), timeout {}s, full-bandwidth: {}",
        blueprint.replication.cadence_secs,
        blueprint.replication.full_bandwidth_cadence_secs,
        blueprint.replication.request_timeout_secs,
        blueprint.replication.full_bandwidth
    );
    println!("\nFusion:");
    println!(
        "  tolerance {}ms, consolidation {}ms, gap factor {}",
        blueprint.fusion.tolerance_ms, blueprint.fusion.consolidation_ms, blueprint.fusion.gap_factor
    );
    println!();
}
