//! CSV codec for the bit-exact on-disk reading schema.
//!
//! Schema: `timestamp,sensor_id,mode,value,TempC,Vin` with ISO-8601
//! timestamps (sub-second precision, explicit UTC offset). Empty string
//! encodes a null `TempC`/`Vin`.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use contracts::{CoreError, Reading};

/// Header row written once per chunk and once per session file.
pub const CSV_HEADER: &str = "timestamp,sensor_id,mode,value,TempC,Vin";

/// ISO-8601 with millisecond precision and explicit `+00:00` offset.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Render one reading as a CSV row (no trailing newline).
pub fn render_row(reading: &Reading) -> String {
    format!(
        "{},{},{},{},{},{}",
        format_timestamp(reading.time),
        reading.sensor_id,
        reading.mode,
        reading.value,
        reading.temp_c.map(|v| v.to_string()).unwrap_or_default(),
        reading.vin.map(|v| v.to_string()).unwrap_or_default(),
    )
}

/// Parse one CSV row back into a reading.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_row(line: &str, line_no: usize) -> Result<Reading, CoreError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 6 {
        return Err(CoreError::RowParse {
            line: line_no,
            message: format!("expected 6 fields, got {}", fields.len()),
        });
    }

    let time = DateTime::parse_from_rfc3339(fields[0])
        .map_err(|e| CoreError::RowParse {
            line: line_no,
            message: format!("bad timestamp '{}': {e}", fields[0]),
        })?
        .with_timezone(&Utc);

    let value: f64 = fields[3].parse().map_err(|e| CoreError::RowParse {
        line: line_no,
        message: format!("bad value '{}': {e}", fields[3]),
    })?;

    Ok(Reading {
        time,
        sensor_id: fields[1].to_string(),
        mode: fields[2].to_string(),
        value,
        temp_c: parse_optional(fields[4], "TempC", line_no)?,
        vin: parse_optional(fields[5], "Vin", line_no)?,
    })
}

fn parse_optional(field: &str, name: &str, line_no: usize) -> Result<Option<f64>, CoreError> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse()
        .map(Some)
        .map_err(|e| CoreError::RowParse {
            line: line_no,
            message: format!("bad {name} '{field}': {e}"),
        })
}

/// A session file split into data rows and recovered sync markers.
#[derive(Debug, Clone, Default)]
pub struct ParsedSession {
    /// Data readings in file order
    pub readings: Vec<Reading>,

    /// Marker readings (SYNC_START / SYNC_STOP), excluded from data
    pub markers: Vec<Reading>,
}

/// Parse a whole session (or chunk) file, extracting markers separately.
pub fn read_session_file(path: &Path) -> Result<ParsedSession, CoreError> {
    if !path.exists() {
        return Err(CoreError::MissingInput {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let mut parsed = ParsedSession::default();

    for (idx, line) in content.lines().enumerate() {
        if line.is_empty() || line == CSV_HEADER {
            continue;
        }
        let reading = parse_row(line, idx + 1)?;
        if reading.is_marker() {
            parsed.markers.push(reading);
        } else {
            parsed.readings.push(reading);
        }
    }

    Ok(parsed)
}

/// Count reading rows in a file (header and blank lines excluded,
/// markers included). Used for chunk finalization and combine verification.
pub fn count_reading_rows(path: &Path) -> Result<u64, CoreError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|l| !l.is_empty() && *l != CSV_HEADER)
        .count() as u64)
}
