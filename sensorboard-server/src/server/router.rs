use super::{auth_handlers, handlers, metrics_handler};
use crate::auth::{AuthMiddleware, extractor::require_session};
use crate::cache::cached_route;
use crate::server::AppState;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// TTL for aggregate routes that change slowly
pub const STATS_TTL: Duration = Duration::from_secs(600);

/// Create the Axum router with all endpoints.
///
/// Layer order matters: cached routes sit behind the session check, which sits
/// behind the auth middleware, so a cache hit is only ever served to a caller
/// that has already been authenticated.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let response_cache = state.response_cache.clone();
    let default_ttl = response_cache.default_ttl();
    let cached = |operation: &'static str, ttl: Duration| {
        middleware::from_fn(cached_route(response_cache.clone(), operation, ttl))
    };

    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(metrics_handler::metrics_handler))
        .route("/auth/register", post(auth_handlers::auth_register))
        .route("/auth/login", post(auth_handlers::auth_login));

    let protected = Router::new()
        .route("/auth/logout", post(auth_handlers::auth_logout))
        .route("/auth/me", get(auth_handlers::auth_me))
        // Uploads
        .route("/upload", post(handlers::upload_file))
        .route("/upload/status/{file_id}", get(handlers::upload_status))
        // Readings API
        .route(
            "/api/v1/logs",
            get(handlers::get_logs).layer(cached("get_logs", default_ttl)),
        )
        .route("/api/v1/logs/{id}", get(handlers::get_log_detail))
        .route(
            "/api/v1/stats",
            get(handlers::get_stats).layer(cached("get_stats", STATS_TTL)),
        )
        .route(
            "/api/v1/files",
            get(handlers::get_files).layer(cached("get_files", default_ttl)),
        )
        .route(
            "/api/v1/dashboard/stats",
            get(handlers::get_dashboard_stats).layer(cached("get_dashboard_stats", STATS_TTL)),
        )
        .route(
            "/api/v1/dashboard/recent-alerts",
            get(handlers::get_recent_alerts),
        )
        // Cache administration
        .route("/api/v1/cache/stats", get(handlers::cache_stats))
        .route("/api/v1/cache/clear", post(handlers::cache_clear))
        // Search; POST passes through the cache layer as a bypass
        .route(
            "/search/query",
            get(handlers::search_logs)
                .post(handlers::search_logs_post)
                .layer(cached("search_logs", default_ttl)),
        )
        .route("/search/filters", get(handlers::search_filters))
        // User administration
        .route("/admin/stats", get(handlers::admin_stats))
        .route("/admin/users", get(handlers::admin_list_users))
        .route(
            "/admin/users/{username}/role",
            post(handlers::admin_set_role),
        )
        .route(
            "/admin/users/{username}/activate",
            post(handlers::admin_activate_user),
        )
        .route(
            "/admin/users/{username}/deactivate",
            post(handlers::admin_deactivate_user),
        )
        .route_layer(middleware::from_fn(require_session));

    let auth = AuthMiddleware::new(
        state.users.clone(),
        state.sessions.clone(),
        state.config.auth.require_auth,
    );

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.upload.max_upload_bytes))
        .layer(middleware::from_fn(metrics_handler::track_http))
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            AuthMiddleware::layer(auth.clone(), req, next)
        }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
