//! Configuration validation.
//!
//! Rules:
//! - non-empty ids and paths (field-level, via the derive)
//! - local and remote sensor ids must differ
//! - peer base_url must be an http(s) URL
//! - recording / replication / fusion tuning values in sane ranges

use contracts::{CoreError, MissionBlueprint};
use validator::Validate;

/// Validate a MissionBlueprint.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &MissionBlueprint) -> Result<(), CoreError> {
    validate_fields(blueprint)?;
    validate_sensors(blueprint)?;
    validate_recording(blueprint)?;
    validate_replication(blueprint)?;
    validate_fusion(blueprint)?;
    Ok(())
}

/// Field-level rules from the derive (non-empty strings)
fn validate_fields(blueprint: &MissionBlueprint) -> Result<(), CoreError> {
    blueprint.validate().map_err(|e| {
        let field = e
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        CoreError::config_validation(field, e.to_string())
    })
}

fn validate_sensors(blueprint: &MissionBlueprint) -> Result<(), CoreError> {
    let sensors = &blueprint.sensors;
    if sensors.local.sensor_id == sensors.remote.sensor_id {
        return Err(CoreError::config_validation(
            "sensors.remote.sensor_id",
            format!(
                "remote sensor id '{}' duplicates the local sensor id",
                sensors.remote.sensor_id
            ),
        ));
    }
    if !sensors.remote.base_url.starts_with("http://")
        && !sensors.remote.base_url.starts_with("https://")
    {
        return Err(CoreError::config_validation(
            "sensors.remote.base_url",
            format!("base_url must be an http(s) URL, got '{}'", sensors.remote.base_url),
        ));
    }
    Ok(())
}

fn validate_recording(blueprint: &MissionBlueprint) -> Result<(), CoreError> {
    let recording = &blueprint.recording;
    if recording.flush_interval_ms == 0 {
        return Err(CoreError::config_validation(
            "recording.flush_interval_ms",
            "flush interval must be > 0",
        ));
    }
    if recording.roll_interval_secs == 0 {
        return Err(CoreError::config_validation(
            "recording.roll_interval_secs",
            "roll interval must be > 0",
        ));
    }
    if recording.buffer_ceiling == 0 {
        return Err(CoreError::config_validation(
            "recording.buffer_ceiling",
            "buffer ceiling must be > 0",
        ));
    }
    Ok(())
}

fn validate_replication(blueprint: &MissionBlueprint) -> Result<(), CoreError> {
    let replication = &blueprint.replication;
    if replication.cadence_secs == 0 || replication.full_bandwidth_cadence_secs == 0 {
        return Err(CoreError::config_validation(
            "replication.cadence_secs",
            "poll cadence must be > 0",
        ));
    }
    if replication.full_bandwidth_cadence_secs > replication.cadence_secs {
        return Err(CoreError::config_validation(
            "replication.full_bandwidth_cadence_secs",
            format!(
                "full-bandwidth cadence ({}) must be <= normal cadence ({})",
                replication.full_bandwidth_cadence_secs, replication.cadence_secs
            ),
        ));
    }
    if replication.request_timeout_secs == 0 {
        return Err(CoreError::config_validation(
            "replication.request_timeout_secs",
            "request timeout must be > 0",
        ));
    }
    Ok(())
}

fn validate_fusion(blueprint: &MissionBlueprint) -> Result<(), CoreError> {
    let fusion = &blueprint.fusion;
    if fusion.tolerance_ms <= 0.0 {
        return Err(CoreError::config_validation(
            "fusion.tolerance_ms",
            format!("tolerance must be > 0, got {}", fusion.tolerance_ms),
        ));
    }
    if fusion.consolidation_ms <= 0.0 {
        return Err(CoreError::config_validation(
            "fusion.consolidation_ms",
            format!("consolidation threshold must be > 0, got {}", fusion.consolidation_ms),
        ));
    }
    if fusion.gap_factor < 1.0 {
        return Err(CoreError::config_validation(
            "fusion.gap_factor",
            format!("gap factor must be >= 1, got {}", fusion.gap_factor),
        ));
    }
    Ok(())
}
