use crate::auth::{
    Action, AuthContextExtractor, SessionManager, UserManager, require_action, require_admin,
};
use crate::cache::{
    CacheAdmin, CacheBackend, CacheStats, CacheStore, Cleared, FunctionCache, ResponseCache,
};
use crate::config::ServerConfig;
use crate::core::{Result, SensorboardError};
use crate::readings::{
    AlertSummary, DashboardStats, GlobalStats, LogPage, LogQuery, Reading, ReadingStore,
    SearchFilters, SearchPage, SearchQuery, UploadedFile,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Function-cache entry holding the search filter values
const SEARCH_FILTERS_KEY: &str = "search_filters";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: UserManager,
    pub sessions: SessionManager,
    pub readings: ReadingStore,
    pub response_cache: ResponseCache,
    pub function_cache: FunctionCache,
    pub cache_admin: CacheAdmin,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the application around an already built cache backend
    pub fn new(config: ServerConfig, backend: Arc<dyn CacheBackend>) -> Result<Self> {
        let users = UserManager::new();
        users.ensure_admin_exists(&config.auth.admin_username, &config.auth.admin_password)?;

        let store = CacheStore::new(backend);
        Ok(Self {
            users,
            sessions: SessionManager::new(config.session_ttl()),
            readings: ReadingStore::new(),
            response_cache: ResponseCache::new(store.clone(), config.default_ttl()),
            function_cache: FunctionCache::new(store.clone()),
            cache_admin: CacheAdmin::new(store),
            config: Arc::new(config),
        })
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "sensorboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ==================== Upload Endpoints ====================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file: UploadedFile,
}

/// POST /upload - multipart upload of a `csv`, `json` or `log` file (field `file`)
pub async fn upload_file(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    require_action(&ctx, Action::Upload)?;
    let limit = state.config.upload.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if data.len() > limit {
            return Err(SensorboardError::PayloadTooLarge(data.len()));
        }

        let uploaded_by = ctx.username.clone().unwrap_or_default();
        let file = state.readings.ingest(&filename, &data, &uploaded_by)?;
        crate::metrics::record_readings_ingested(file.format.as_str(), file.records_count);

        // Filter values may have changed; route responses age out by TTL
        state.function_cache.delete(SEARCH_FILTERS_KEY).await;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded successfully".to_string(),
                file,
            }),
        ));
    }

    Err(SensorboardError::InvalidRequest("No file part".to_string()))
}

fn multipart_error(e: MultipartError, limit: usize) -> SensorboardError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SensorboardError::PayloadTooLarge(limit)
    } else {
        SensorboardError::InvalidRequest(e.body_text())
    }
}

/// GET /upload/status/{file_id}
pub async fn upload_status(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<UploadedFile>> {
    state
        .readings
        .file(&file_id)
        .map(Json)
        .ok_or_else(|| SensorboardError::NotFound("File not found".to_string()))
}

// ==================== Readings API ====================

/// GET /api/v1/logs - paginated readings
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<LogPage> {
    Json(state.readings.logs(&query))
}

/// GET /api/v1/logs/{id}
pub async fn get_log_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reading>> {
    state
        .readings
        .reading(&id)
        .map(Json)
        .ok_or_else(|| SensorboardError::NotFound("Log not found".to_string()))
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<GlobalStats> {
    Json(state.readings.stats(Utc::now()))
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<UploadedFile>,
}

/// GET /api/v1/files
pub async fn get_files(State(state): State<AppState>) -> Json<FilesResponse> {
    Json(FilesResponse {
        files: state.readings.files(),
    })
}

/// GET /api/v1/dashboard/stats
pub async fn get_dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.readings.dashboard_stats(Utc::now()))
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertSummary>,
}

/// GET /api/v1/dashboard/recent-alerts
pub async fn get_recent_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    Json(AlertsResponse {
        alerts: state.readings.recent_alerts(),
    })
}

// ==================== Search ====================

/// GET /search/query
pub async fn search_logs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>> {
    state.readings.search(&query).map(Json)
}

/// POST /search/query - same search with a JSON body
pub async fn search_logs_post(
    State(state): State<AppState>,
    Json(query): Json<SearchQuery>,
) -> Result<Json<SearchPage>> {
    state.readings.search(&query).map(Json)
}

/// GET /search/filters
pub async fn search_filters(State(state): State<AppState>) -> Json<SearchFilters> {
    let readings = state.readings.clone();
    let filters = state
        .function_cache
        .get_or_compute(
            SEARCH_FILTERS_KEY,
            &[],
            state.response_cache.default_ttl(),
            || async move { readings.search_filters() },
        )
        .await;
    Json(filters)
}

// ==================== Cache Administration ====================

/// GET /api/v1/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache_admin.stats().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    /// Glob pattern; omitted clears everything
    pub pattern: Option<String>,
}

/// POST /api/v1/cache/clear - admin only
pub async fn cache_clear(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
    body: Option<Json<ClearCacheRequest>>,
) -> Result<Json<Value>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let pattern = req.pattern.filter(|p| !p.is_empty());

    let cleared = state.cache_admin.clear(&ctx, pattern.as_deref()).await?;
    debug!("Cache clear result: {:?}", cleared);

    let pattern = pattern.unwrap_or_else(|| "*".to_string());
    Ok(Json(match cleared {
        Some(cleared) => {
            let scope = match cleared {
                Cleared::All { .. } => "all",
                Cleared::Matched { .. } => "matched",
            };
            json!({
                "message": "Cleared cache",
                "pattern": pattern,
                "scope": scope,
                "keys_deleted": cleared.keys_deleted(),
            })
        }
        None => json!({
            "message": "Cache backend unavailable",
            "pattern": pattern,
            "keys_deleted": Value::Null,
        }),
    }))
}

// ==================== Admin ====================

/// GET /admin/users
pub async fn admin_list_users(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
) -> Result<Json<Value>> {
    require_admin(&ctx)?;
    Ok(Json(json!({ "users": state.users.list_users() })))
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_users: usize,
    pub total_files: usize,
    pub total_logs: usize,
}

/// GET /admin/stats
pub async fn admin_stats(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
) -> Result<Json<AdminStats>> {
    require_admin(&ctx)?;
    let (total_files, total_logs) = state.readings.counts();
    Ok(Json(AdminStats {
        total_users: state.users.list_users().len(),
        total_files,
        total_logs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: crate::auth::Role,
}

/// POST /admin/users/{username}/role
pub async fn admin_set_role(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
    Path(username): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<Value>> {
    require_admin(&ctx)?;
    let user = state.users.set_role(&username, req.role)?;
    info!("User {} is now {}", user.username, user.role);
    Ok(Json(json!({ "message": "Role updated", "user": user })))
}

/// POST /admin/users/{username}/activate
pub async fn admin_activate_user(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    require_admin(&ctx)?;
    let user = state.users.set_active(&username, true)?;
    Ok(Json(json!({ "message": "User activated", "user": user })))
}

/// POST /admin/users/{username}/deactivate
pub async fn admin_deactivate_user(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    require_admin(&ctx)?;
    if ctx.username.as_deref() == Some(username.as_str()) {
        return Err(SensorboardError::InvalidRequest(
            "Cannot deactivate your own account".to_string(),
        ));
    }

    let user = state.users.set_active(&username, false)?;
    let revoked = state.sessions.revoke_user(&user.id);
    info!("User {} deactivated ({} sessions closed)", user.username, revoked);
    Ok(Json(json!({ "message": "User deactivated", "user": user })))
}
