//! Configuration parsing.
//!
//! TOML is the primary format; JSON is accepted as well.

use contracts::{CoreError, MissionBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a TOML mission configuration
pub fn parse_toml(content: &str) -> Result<MissionBlueprint, CoreError> {
    toml::from_str(content).map_err(|e| CoreError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a JSON mission configuration
pub fn parse_json(content: &str) -> Result<MissionBlueprint, CoreError> {
    serde_json::from_str(content).map_err(|e| CoreError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<MissionBlueprint, CoreError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}
