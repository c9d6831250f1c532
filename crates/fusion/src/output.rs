//! Wide-format unified output writer.

use std::path::Path;

use contracts::Reading;
use session_store::format_timestamp;

use crate::engine::WideRow;
use crate::error::FusionError;

/// Unified output header: one timestamp plus side-by-side sensor columns.
pub const UNIFIED_HEADER: &str = "timestamp,inwater_sensor_id,inwater_mode,inwater_value,inwater_TempC,inwater_Vin,surface_sensor_id,surface_mode,surface_value,surface_TempC,surface_Vin";

/// Unified output file name for a mission.
pub fn unified_file_name(mission: &str) -> String {
    format!("unified_{mission}.csv")
}

fn sensor_fields(reading: Option<&Reading>) -> String {
    match reading {
        Some(r) => format!(
            "{},{},{},{},{}",
            r.sensor_id,
            r.mode,
            r.value,
            r.temp_c.map(|v| v.to_string()).unwrap_or_default(),
            r.vin.map(|v| v.to_string()).unwrap_or_default(),
        ),
        // Empty string for every null field
        None => ",,,,".to_string(),
    }
}

/// Render one fused row (no trailing newline).
pub fn render_wide_row(row: &WideRow) -> String {
    format!(
        "{},{},{}",
        format_timestamp(row.time),
        sensor_fields(row.inwater.as_ref()),
        sensor_fields(row.surface.as_ref()),
    )
}

/// Atomically write the full unified output.
pub fn write_unified(path: &Path, rows: &[WideRow]) -> Result<(), FusionError> {
    let mut content = String::with_capacity(UNIFIED_HEADER.len() + rows.len() * 96);
    content.push_str(UNIFIED_HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(&render_wide_row(row));
        content.push('\n');
    }
    integrity::atomic_write(path, content.as_bytes())?;
    Ok(())
}
