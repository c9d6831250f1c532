//! # Config Loader
//!
//! Mission configuration loading and parsing.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `MissionBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("mission.toml")).unwrap();
//! println!("Mission: {}", blueprint.mission.label);
//! ```

mod parser;
mod validator;

pub use contracts::MissionBlueprint;
pub use parser::ConfigFormat;

use contracts::CoreError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<MissionBlueprint, CoreError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MissionBlueprint, CoreError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize a MissionBlueprint to a TOML string
    pub fn to_toml(blueprint: &MissionBlueprint) -> Result<String, CoreError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| CoreError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a MissionBlueprint to a JSON string
    pub fn to_json(blueprint: &MissionBlueprint) -> Result<String, CoreError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| CoreError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, CoreError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            CoreError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| CoreError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, CoreError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MissionBlueprint, CoreError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[mission]
label = "dive-12"

[storage]
root_dir = "/data/missions"

[sensors.local]
sensor_id = "surface-ph"

[sensors.remote]
sensor_id = "rov-ph"
base_url = "http://192.168.2.2:8090"

[replication]
full_bandwidth = true
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.mission.label, "dive-12");
        assert!(bp.replication.full_bandwidth);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp, bp2);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.mission.label, bp2.mission.label);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // Local and remote sensors sharing an id must fail validation
        let content = r#"
[mission]
label = "dive-12"

[storage]
root_dir = "/data/missions"

[sensors.local]
sensor_id = "ph-probe"

[sensors.remote]
sensor_id = "ph-probe"
base_url = "http://192.168.2.2:8090"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicates"));
    }
}
