//! Mission run statistics.

use std::path::PathBuf;
use std::time::Duration;

use contracts::FusionStatus;
use fusion::FusionReport;
use observability::MissionSummary;
use session_store::SessionSummary;

/// Statistics from a mission run
#[derive(Debug, Clone)]
pub struct MissionRunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Session pair directory created for this run
    pub pair_dir: PathBuf,

    /// Local session outcome
    pub local_summary: SessionSummary,

    /// Mirrored remote session outcome, when replication ran
    pub remote_summary: Option<SessionSummary>,

    /// Fusion outcome, when the pair reached fusion
    pub fusion_report: Option<FusionReport>,

    /// In-memory recording aggregates
    pub recording: MissionSummary,
}

impl MissionRunStats {
    /// Reading rows per second over the whole run
    pub fn rows_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.local_summary.rows as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Mission Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Pair directory: {}", self.pair_dir.display());
        println!("   └─ Local rate: {:.2} rows/s", self.rows_per_sec());

        println!("\n💾 Local session");
        print_session(&self.local_summary);

        match &self.remote_summary {
            Some(summary) => {
                println!("\n🔁 Mirrored session");
                print_session(summary);
            }
            None => {
                println!("\n🔁 Mirrored session: (none)");
            }
        }

        println!("\n🔀 Fusion");
        match &self.fusion_report {
            Some(report) => match report.status {
                FusionStatus::Complete => {
                    println!("   ├─ Status: complete");
                    println!("   ├─ Rows: {}", report.rows);
                    match &report.output_file {
                        Some(path) => println!("   └─ Output: {}", path.display()),
                        None => println!("   └─ Output: (none)"),
                    }
                }
                FusionStatus::Skipped => {
                    println!("   └─ Status: skipped (single-sensor session)");
                }
                FusionStatus::Failed => {
                    println!("   ├─ Status: failed");
                    println!(
                        "   └─ Error: {}",
                        report.error.as_deref().unwrap_or("unknown")
                    );
                }
                FusionStatus::Pending => {
                    println!("   └─ Status: pending");
                }
            },
            None => {
                println!("   └─ Status: deferred (pair incomplete)");
            }
        }

        println!("\n{}", self.recording);
    }
}

fn print_session(summary: &SessionSummary) {
    println!("   ├─ Session: {}", summary.session_id);
    println!("   ├─ Rows: {}", summary.rows);
    println!("   ├─ Bytes: {}", summary.bytes);
    println!(
        "   └─ Verified: {}",
        if summary.verified { "yes" } else { "no (chunks kept)" }
    );
}
