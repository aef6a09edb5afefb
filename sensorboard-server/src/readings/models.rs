use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Readings whose status is not `normal` count as alerts
pub const NORMAL_STATUS: &str = "normal";

/// A stored sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub sensor_id: String,
    pub sensor_type: String,
    pub zone: String,
    pub value: f64,
    pub unit: String,
    /// `normal`, `warning`, `alert` or `critical`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Upload the reading came from
    pub file_id: String,
}

impl Reading {
    pub fn is_alert(&self) -> bool {
        self.status != NORMAL_STATUS
    }

    pub fn alert_bucket(&self) -> AlertBucket {
        AlertBucket::from_status(&self.status)
    }

    /// Case-insensitive match against the searchable text fields
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            Some(self.sensor_id.as_str()),
            Some(self.zone.as_str()),
            Some(self.sensor_type.as_str()),
            self.alert_message.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// A reading as found in an uploaded file
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    pub sensor_id: String,
    pub sensor_type: String,
    #[serde(default)]
    pub zone: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub alert_message: Option<String>,
    #[serde(default, alias = "@timestamp", deserialize_with = "empty_as_none")]
    pub timestamp: Option<String>,
}

fn default_status() -> String {
    NORMAL_STATUS.to_string()
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Parse a timestamp as RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Alert bucket used by the global stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertBucket {
    Critical,
    High,
    Normal,
}

impl AlertBucket {
    /// `warning` and `alert` both map to `high`; unknown statuses count as normal
    pub fn from_status(status: &str) -> Self {
        match status {
            "critical" => AlertBucket::Critical,
            "warning" | "alert" => AlertBucket::High,
            _ => AlertBucket::Normal,
        }
    }
}

/// Upload file format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Csv,
    Json,
    /// JSON lines
    Log,
}

impl UploadFormat {
    pub const ALLOWED: [&'static str; 3] = ["csv", "json", "log"];

    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "csv" => Some(UploadFormat::Csv),
            "json" => Some(UploadFormat::Json),
            "log" => Some(UploadFormat::Log),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadFormat::Csv => "csv",
            UploadFormat::Json => "json",
            UploadFormat::Log => "log",
        }
    }
}

impl fmt::Display for UploadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processed,
}

/// Registry entry for an uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    /// Stored name: upload timestamp plus the sanitized original name
    pub filename: String,
    pub original_filename: String,
    pub size: usize,
    pub format: UploadFormat,
    pub status: UploadStatus,
    pub records_count: usize,
    pub upload_date: DateTime<Utc>,
    pub uploaded_by: String,
}

/// Filters for the paginated log listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub sensor_type: Option<String>,
    pub zone: Option<String>,
    /// Matched against the reading status
    pub alert_level: Option<String>,
}

/// Full-text search request, from query string or JSON body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub sensor_type: Option<String>,
    pub zone: Option<String>,
    pub alert_level: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// One page of readings
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<Reading>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    #[serde(flatten)]
    pub page: LogPage,
    pub took_ms: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertCounts {
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
}

/// Global statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalStats {
    pub total_logs: usize,
    pub total_files: usize,
    pub sensors_count: usize,
    pub avg_temperature: f64,
    pub today_alerts: usize,
    pub alerts: AlertCounts,
}

/// Dashboard statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_logs: usize,
    pub avg_temperature: f64,
    /// Alerts within the last 24 hours
    pub alerts_today: usize,
    pub active_sensors: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_zone: BTreeMap<String, usize>,
}

/// Summary line for the recent alerts panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub zone: String,
    pub message: String,
    pub level: String,
}

impl From<&Reading> for AlertSummary {
    fn from(reading: &Reading) -> Self {
        Self {
            date: reading.timestamp,
            sensor_type: reading.sensor_type.clone(),
            zone: reading.zone.clone(),
            message: format!(
                "{} - {} {}",
                reading.sensor_type, reading.value, reading.unit
            )
            .trim_end()
            .to_string(),
            level: reading.status.clone(),
        }
    }
}

/// Distinct values offered as search filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub sensor_types: Vec<String>,
    pub zones: Vec<String>,
    pub alert_levels: Vec<String>,
}
