//! `fuse` command implementation.
//!
//! Standalone fusion over an existing session pair directory, typically
//! after an operator fixed a degraded session by hand.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::FusionStatus;
use fusion::FusionReport;

use crate::cli::FuseArgs;

/// Fusion report for JSON output
#[derive(Serialize)]
struct FuseResult {
    status: String,
    rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&FusionReport> for FuseResult {
    fn from(report: &FusionReport) -> Self {
        Self {
            status: format!("{:?}", report.status).to_lowercase(),
            rows: report.rows,
            output_file: report
                .output_file
                .as_ref()
                .map(|p| p.display().to_string()),
            error: report.error.clone(),
        }
    }
}

/// Execute the `fuse` command
pub fn run_fuse(args: &FuseArgs) -> Result<()> {
    if !args.pair_dir.is_dir() {
        anyhow::bail!(
            "Session pair directory not found: {}",
            args.pair_dir.display()
        );
    }

    // Fusion tuning comes from the mission config when present; a missing
    // config file falls back to operating defaults.
    let fusion_config = if args.config.exists() {
        config_loader::ConfigLoader::load_from_path(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()))?
            .fusion
    } else {
        info!(config = %args.config.display(), "Config not found; using default fusion tuning");
        contracts::FusionConfig::default()
    };

    info!(
        pair_dir = %args.pair_dir.display(),
        tolerance_ms = fusion_config.tolerance_ms,
        "Running fusion"
    );

    let report = fusion::run_fusion(&args.pair_dir, &fusion_config, args.coarse_offset_ms)
        .context("Fusion failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&FuseResult::from(&report))
            .context("Failed to serialize fusion report")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }

    match report.status {
        FusionStatus::Failed => anyhow::bail!(
            "Fusion failed: {}",
            report.error.as_deref().unwrap_or("unknown reason")
        ),
        _ => Ok(()),
    }
}

fn print_report(report: &FusionReport) {
    match report.status {
        FusionStatus::Complete => {
            println!("✓ Fusion complete: {} rows", report.rows);
            if let Some(ref path) = report.output_file {
                println!("  Output: {}", path.display());
            }
        }
        FusionStatus::Skipped => {
            println!("- Single-sensor session, nothing to fuse");
        }
        FusionStatus::Failed => {
            println!("✗ Fusion failed");
            if let Some(ref error) = report.error {
                println!("  Error: {}", error);
            }
        }
        FusionStatus::Pending => {
            println!("- Fusion pending");
        }
    }
}
