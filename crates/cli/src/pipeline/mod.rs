//! Mission orchestration module.

mod mock_source;
mod orchestrator;
mod stats;

pub use mock_source::{MockProbeSource, ProbeConfig};
pub use orchestrator::{MissionConfig, MissionRunner};
pub use stats::MissionRunStats;
