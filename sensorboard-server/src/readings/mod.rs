//! Sensor readings: upload ingestion, file registry and the queries behind
//! the dashboard endpoints

pub mod ingest;
pub mod models;
pub mod store;

pub use models::{
    AlertCounts, AlertSummary, DashboardStats, GlobalStats, LogPage, LogQuery, Reading,
    SearchFilters, SearchPage, SearchQuery, UploadFormat, UploadStatus, UploadedFile,
};
pub use store::ReadingStore;
