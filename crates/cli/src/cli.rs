//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Hydro Syncer - dual-sensor time-series recorder with replication and fusion
#[derive(Parser, Debug)]
#[command(
    name = "hydro-syncer",
    author,
    version,
    about = "Dual-sensor recording, replication and fusion for field missions",
    long_about = "Records a surface sensor into an integrity-checked chunked session \n\
                  store, mirrors the in-water peer's chunks over HTTP as they \n\
                  finalize, brackets both streams with sync markers, and fuses the \n\
                  pair into a single wide CSV once both session files verify."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "HYDRO_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "HYDRO_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a mission: local session, peer mirroring, markers, fusion
    Run(RunArgs),

    /// Fuse an existing session pair directory into a unified CSV
    Fuse(FuseArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "mission.toml",
        env = "HYDRO_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Recording duration in seconds (0 = run until Ctrl+C)
    #[arg(long, default_value = "0", env = "HYDRO_SYNCER_DURATION")]
    pub duration: u64,

    /// Skip peer replication; record the local sensor only
    #[arg(long)]
    pub offline: bool,

    /// Poll the peer at the full-bandwidth cadence from the start
    #[arg(long, conflicts_with = "offline")]
    pub full_bandwidth: bool,

    /// Local reading cadence in Hz for the built-in probe source
    #[arg(long, default_value = "5.0", env = "HYDRO_SYNCER_FREQUENCY")]
    pub frequency: f64,

    /// Known coarse clock offset (remote - local, ms) as a drift fallback
    #[arg(long, env = "HYDRO_SYNCER_COARSE_OFFSET_MS")]
    pub coarse_offset_ms: Option<f64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "HYDRO_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without recording
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `fuse` command
#[derive(Parser, Debug, Clone)]
pub struct FuseArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "mission.toml",
        env = "HYDRO_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Session pair directory holding the two session subdirectories
    pub pair_dir: PathBuf,

    /// Known coarse clock offset (remote - local, ms) as a drift fallback
    #[arg(long, env = "HYDRO_SYNCER_COARSE_OFFSET_MS")]
    pub coarse_offset_ms: Option<f64>,

    /// Output the fusion report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "mission.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "mission.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show tuning sections (recording, replication, fusion)
    #[arg(long)]
    pub tuning: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
