//! Prometheus Metrics for Sensorboard
//!
//! - Response cache lookups per wrapped operation
//! - HTTP requests and latency
//! - Ingested sensor readings

use crate::cache::CacheOutcome;
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};

lazy_static! {
    // ============================================================================
    // Cache Metrics
    // ============================================================================

    /// Response cache lookups by wrapped operation and outcome (hit, miss, bypass)
    pub static ref CACHE_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sensorboard_cache_requests_total",
        "Total response cache lookups by operation and outcome",
        &["operation", "outcome"]
    ).unwrap();

    // ============================================================================
    // HTTP Server Metrics
    // ============================================================================

    /// HTTP requests total
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sensorboard_http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    ).unwrap();

    /// HTTP request duration
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "sensorboard_http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.01, 0.1, 1.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Ingestion Metrics
    // ============================================================================

    /// Readings ingested from uploads
    pub static ref READINGS_INGESTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sensorboard_readings_ingested_total",
        "Total sensor readings ingested by upload format",
        &["format"]
    ).unwrap();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Initialize metrics so they are exported before the first observation
pub fn init_metrics() {
    let _ = &*CACHE_REQUESTS_TOTAL;
    let _ = &*HTTP_REQUESTS_TOTAL;
    let _ = &*HTTP_REQUEST_DURATION;
    let _ = &*READINGS_INGESTED_TOTAL;

    tracing::info!("Prometheus metrics initialized (4 metric types registered)");
}

/// Record a response cache lookup
pub fn record_cache_lookup(operation: &str, outcome: CacheOutcome) {
    CACHE_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome.as_str()])
        .inc();
}

/// Record HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Record ingested readings
pub fn record_readings_ingested(format: &str, count: usize) {
    READINGS_INGESTED_TOTAL
        .with_label_values(&[format])
        .inc_by(count as u64);
}
