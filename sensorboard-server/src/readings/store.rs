use super::ingest;
use super::models::{
    AlertBucket, AlertCounts, AlertSummary, DashboardStats, GlobalStats, LogPage, LogQuery,
    Reading, SearchFilters, SearchPage, SearchQuery, UploadFormat, UploadStatus, UploadedFile,
    parse_timestamp,
};
use crate::core::{Result, SensorboardError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: usize = 50;
pub const MAX_PER_PAGE: usize = 1000;
/// Files listed by the file registry endpoint
pub const FILES_LIMIT: usize = 50;
pub const RECENT_ALERTS_LIMIT: usize = 10;

const TEMPERATURE: &str = "temperature";

#[derive(Default)]
struct Inner {
    files: Vec<UploadedFile>,
    /// Newest first
    readings: Vec<Reading>,
}

/// In-memory store of uploaded files and their readings
#[derive(Clone, Default)]
pub struct ReadingStore {
    inner: Arc<RwLock<Inner>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        info!("Initializing Reading Store");
        Self::default()
    }

    /// Parse and index an uploaded file, then register it
    pub fn ingest(&self, original_filename: &str, data: &[u8], uploaded_by: &str) -> Result<UploadedFile> {
        if original_filename.trim().is_empty() {
            return Err(SensorboardError::InvalidRequest("No selected file".to_string()));
        }
        let format = UploadFormat::from_filename(original_filename).ok_or_else(|| {
            SensorboardError::InvalidRequest(format!(
                "File type not allowed. Allowed: {}",
                UploadFormat::ALLOWED.join(", ")
            ))
        })?;

        let raw = ingest::parse(format, data)?;
        let now = Utc::now();
        let file_id = Uuid::new_v4().to_string();

        let mut readings = Vec::with_capacity(raw.len());
        for (idx, r) in raw.into_iter().enumerate() {
            let timestamp = match r.timestamp.as_deref() {
                Some(ts) => parse_timestamp(ts).ok_or_else(|| {
                    SensorboardError::InvalidRequest(format!(
                        "Invalid timestamp in record {}: {}",
                        idx + 1,
                        ts
                    ))
                })?,
                None => now,
            };
            readings.push(Reading {
                id: Uuid::new_v4().to_string(),
                sensor_id: r.sensor_id,
                sensor_type: r.sensor_type.to_lowercase(),
                zone: r.zone,
                value: r.value,
                unit: r.unit,
                status: r.status.to_lowercase(),
                alert_message: r.alert_message,
                timestamp,
                file_id: file_id.clone(),
            });
        }

        let file = UploadedFile {
            id: file_id,
            filename: format!(
                "{}_{}",
                now.format("%Y%m%d_%H%M%S"),
                secure_filename(original_filename)
            ),
            original_filename: original_filename.to_string(),
            size: data.len(),
            format,
            status: UploadStatus::Processed,
            records_count: readings.len(),
            upload_date: now,
            uploaded_by: uploaded_by.to_string(),
        };

        let mut inner = self.inner.write();
        inner.readings.extend(readings);
        inner
            .readings
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        inner.files.push(file.clone());

        info!(
            "Ingested {} readings from {} ({})",
            file.records_count, file.filename, format
        );
        Ok(file)
    }

    /// Upload registry entry by id
    pub fn file(&self, id: &str) -> Option<UploadedFile> {
        self.inner.read().files.iter().find(|f| f.id == id).cloned()
    }

    /// Most recent uploads, newest first
    pub fn files(&self) -> Vec<UploadedFile> {
        let inner = self.inner.read();
        inner
            .files
            .iter()
            .rev()
            .take(FILES_LIMIT)
            .cloned()
            .collect()
    }

    /// Registered uploads and stored readings
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.files.len(), inner.readings.len())
    }

    pub fn reading(&self, id: &str) -> Option<Reading> {
        self.inner.read().readings.iter().find(|r| r.id == id).cloned()
    }

    /// Paginated readings, newest first
    pub fn logs(&self, query: &LogQuery) -> LogPage {
        let inner = self.inner.read();
        let matching: Vec<&Reading> = inner
            .readings
            .iter()
            .filter(|r| field_matches(&r.sensor_type, query.sensor_type.as_deref()))
            .filter(|r| field_matches(&r.zone, query.zone.as_deref()))
            .filter(|r| field_matches(&r.status, query.alert_level.as_deref()))
            .collect();

        paginate(&matching, query.page, query.per_page)
    }

    /// Text search with filters and a date range
    pub fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let started = Instant::now();
        let date_from = parse_bound(query.date_from.as_deref(), "date_from")?;
        let date_to = parse_bound(query.date_to.as_deref(), "date_to")?;
        let text = query.q.trim();

        let inner = self.inner.read();
        let matching: Vec<&Reading> = inner
            .readings
            .iter()
            .filter(|r| text.is_empty() || r.matches_text(text))
            .filter(|r| field_matches(&r.sensor_type, query.sensor_type.as_deref()))
            .filter(|r| field_matches(&r.zone, query.zone.as_deref()))
            .filter(|r| field_matches(&r.status, query.alert_level.as_deref()))
            .filter(|r| date_from.is_none_or(|from| r.timestamp >= from))
            .filter(|r| date_to.is_none_or(|to| r.timestamp <= to))
            .collect();

        let page = paginate(&matching, query.page, query.per_page);
        debug!("Search {:?} matched {} readings", text, page.total);

        Ok(SearchPage {
            page,
            took_ms: started.elapsed().as_millis(),
        })
    }

    /// Global statistics; "today" is the current UTC date
    pub fn stats(&self, now: DateTime<Utc>) -> GlobalStats {
        let inner = self.inner.read();
        let today = now.date_naive();

        let mut alerts = AlertCounts::default();
        for reading in &inner.readings {
            match reading.alert_bucket() {
                AlertBucket::Critical => alerts.critical += 1,
                AlertBucket::High => alerts.high += 1,
                AlertBucket::Normal => alerts.normal += 1,
            }
        }

        GlobalStats {
            total_logs: inner.readings.len(),
            total_files: inner.files.len(),
            sensors_count: distinct_sensors(&inner.readings),
            avg_temperature: avg_temperature(&inner.readings),
            today_alerts: inner
                .readings
                .iter()
                .filter(|r| r.is_alert() && r.timestamp.date_naive() == today)
                .count(),
            alerts,
        }
    }

    /// Dashboard statistics; alerts counted over the last 24 hours
    pub fn dashboard_stats(&self, now: DateTime<Utc>) -> DashboardStats {
        let inner = self.inner.read();
        let since = now - ChronoDuration::hours(24);

        let mut by_type = BTreeMap::new();
        let mut by_zone = BTreeMap::new();
        for reading in &inner.readings {
            *by_type.entry(reading.sensor_type.clone()).or_insert(0) += 1;
            if !reading.zone.is_empty() {
                *by_zone.entry(reading.zone.clone()).or_insert(0) += 1;
            }
        }

        DashboardStats {
            total_logs: inner.readings.len(),
            avg_temperature: avg_temperature(&inner.readings),
            alerts_today: inner
                .readings
                .iter()
                .filter(|r| r.is_alert() && r.timestamp >= since)
                .count(),
            active_sensors: distinct_sensors(&inner.readings),
            by_type,
            by_zone,
        }
    }

    /// Most recent non-normal readings
    pub fn recent_alerts(&self) -> Vec<AlertSummary> {
        self.inner
            .read()
            .readings
            .iter()
            .filter(|r| r.is_alert())
            .take(RECENT_ALERTS_LIMIT)
            .map(AlertSummary::from)
            .collect()
    }

    /// Distinct sensor types, zones and statuses, sorted
    pub fn search_filters(&self) -> SearchFilters {
        let inner = self.inner.read();
        let mut sensor_types = BTreeSet::new();
        let mut zones = BTreeSet::new();
        let mut alert_levels = BTreeSet::new();
        for reading in &inner.readings {
            sensor_types.insert(reading.sensor_type.clone());
            if !reading.zone.is_empty() {
                zones.insert(reading.zone.clone());
            }
            alert_levels.insert(reading.status.clone());
        }

        SearchFilters {
            sensor_types: sensor_types.into_iter().collect(),
            zones: zones.into_iter().collect(),
            alert_levels: alert_levels.into_iter().collect(),
        }
    }
}

fn field_matches(value: &str, filter: Option<&str>) -> bool {
    match filter.map(str::trim) {
        None | Some("") => true,
        Some(wanted) => value.eq_ignore_ascii_case(wanted),
    }
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_bound_value(raw).map(Some).ok_or_else(|| {
            SensorboardError::InvalidRequest(format!("Invalid {}: {}", name, raw))
        }),
    }
}

/// Accepts full timestamps or a bare `YYYY-MM-DD` (start of day)
fn parse_bound_value(raw: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(raw).or_else(|| {
        chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

fn paginate(matching: &[&Reading], page: Option<usize>, per_page: Option<usize>) -> LogPage {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let total = matching.len();

    let logs = matching
        .iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .map(|r| (*r).clone())
        .collect();

    LogPage {
        logs,
        total,
        page,
        per_page,
        pages: total.div_ceil(per_page),
    }
}

fn distinct_sensors(readings: &[Reading]) -> usize {
    readings
        .iter()
        .map(|r| r.sensor_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Mean temperature rounded to one decimal, 0 without temperature readings
fn avg_temperature(readings: &[Reading]) -> f64 {
    let (sum, count) = readings
        .iter()
        .filter(|r| r.sensor_type == TEMPERATURE)
        .fold((0.0, 0usize), |(sum, count), r| (sum + r.value, count + 1));

    if count == 0 {
        return 0.0;
    }
    (sum / count as f64 * 10.0).round() / 10.0
}

/// Keep ASCII alphanumerics plus `.`, `-` and `_`; other characters become `_`
fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}
