//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    mission: String,
    storage_root: String,
    local_sensor: String,
    remote_sensor: String,
    peer_url: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    mission: blueprint.mission.label.clone(),
                    storage_root: blueprint.storage.root_dir.clone(),
                    local_sensor: blueprint.sensors.local.sensor_id.clone(),
                    remote_sensor: blueprint.sensors.remote.sensor_id.clone(),
                    peer_url: blueprint.sensors.remote.base_url.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::MissionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if !std::path::Path::new(&blueprint.storage.root_dir).is_dir() {
        warnings.push(format!(
            "Storage root '{}' does not exist yet - it will be created on first run",
            blueprint.storage.root_dir
        ));
    }

    if blueprint.fusion.consolidation_ms > blueprint.fusion.tolerance_ms {
        warnings.push(format!(
            "fusion.consolidation_ms ({}) exceeds tolerance_ms ({}) - axis clusters may swallow whole tolerance windows",
            blueprint.fusion.consolidation_ms, blueprint.fusion.tolerance_ms
        ));
    }

    if blueprint.replication.full_bandwidth {
        warnings.push(format!(
            "replication.full_bandwidth is on - polling every {}s from the start",
            blueprint.replication.full_bandwidth_cadence_secs
        ));
    }

    if blueprint.replication.cadence_secs > blueprint.recording.roll_interval_secs * 2 {
        warnings.push(format!(
            "replication.cadence_secs ({}) is much longer than the chunk roll window ({}s) - chunks will pile up between polls",
            blueprint.replication.cadence_secs, blueprint.recording.roll_interval_secs
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Mission: {}", summary.mission);
            println!("  Storage root: {}", summary.storage_root);
            println!("  Local sensor: {}", summary.local_sensor);
            println!("  Remote sensor: {}", summary.remote_sensor);
            println!("  Peer URL: {}", summary.peer_url);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
