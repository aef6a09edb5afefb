//! Upload parsing
//!
//! - `csv`: header row naming the reading fields
//! - `json`: an array of readings, or an object with a `readings` array
//! - `log`: one JSON reading per line, blank lines ignored

use super::models::{RawReading, UploadFormat};
use crate::core::{Result, SensorboardError};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonUpload {
    List(Vec<RawReading>),
    Wrapped { readings: Vec<RawReading> },
}

/// Parse an uploaded file into raw readings
pub fn parse(format: UploadFormat, data: &[u8]) -> Result<Vec<RawReading>> {
    match format {
        UploadFormat::Csv => parse_csv(data),
        UploadFormat::Json => parse_json(data),
        UploadFormat::Log => parse_lines(data),
    }
}

fn parse_csv(data: &[u8]) -> Result<Vec<RawReading>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    reader
        .deserialize::<RawReading>()
        .enumerate()
        .map(|(row, record)| {
            // Header is line 1
            record.map_err(|e| {
                SensorboardError::InvalidRequest(format!("Invalid CSV row {}: {}", row + 2, e))
            })
        })
        .collect()
}

fn parse_json(data: &[u8]) -> Result<Vec<RawReading>> {
    let upload: JsonUpload = serde_json::from_slice(data)
        .map_err(|e| SensorboardError::InvalidRequest(format!("Invalid JSON upload: {}", e)))?;

    Ok(match upload {
        JsonUpload::List(readings) | JsonUpload::Wrapped { readings } => readings,
    })
}

fn parse_lines(data: &[u8]) -> Result<Vec<RawReading>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| SensorboardError::InvalidRequest("Log upload is not UTF-8".to_string()))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                SensorboardError::InvalidRequest(format!("Invalid log line {}: {}", idx + 1, e))
            })
        })
        .collect()
}
