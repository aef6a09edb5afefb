//! Authentication REST API Handlers
//!
//! Registration, login/logout with session cookies, and the current user

use super::AppState;
use crate::auth::{AuthContextExtractor, Registration, Role, SESSION_COOKIE, User};
use crate::core::{Result, SensorboardError};
use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// User info (without password)
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            is_admin: user.is_admin(),
            active: user.active,
            last_login: user.last_login,
        }
    }
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    /// Same value as the session cookie, for clients sending `Bearer` tokens
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

/// POST /auth/register - self-service registration
pub async fn auth_register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let user = state.users.register(&form)?;
    info!("Registered user {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Account created successfully",
            "user": UserInfo::from(&user),
        })),
    ))
}

/// POST /auth/login - Login with username/password, opens a session
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(SensorboardError::InvalidRequest(
            "Missing credentials".to_string(),
        ));
    }
    debug!("Login attempt for user: {}", req.username);

    let user = state.users.authenticate(&req.username, &req.password)?;
    let session = state.sessions.create(&user);
    info!("User login: {}", user.username);

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.token,
        state.sessions.ttl().as_secs()
    );
    let body = LoginResponse {
        message: "Logged in successfully".to_string(),
        token: session.token.clone(),
        expires_at: session.expires_at,
        user: UserInfo::from(&user),
    };

    with_cookie(Json(body).into_response(), &cookie)
}

/// POST /auth/logout - closes the current session
pub async fn auth_logout(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
) -> Result<Response> {
    if let Some(token) = ctx.session_token.as_deref() {
        state.sessions.revoke(token);
    }
    info!("User logout: {:?}", ctx.username);

    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    let body = Json(json!({ "message": "Logged out" }));
    with_cookie(body.into_response(), &cookie)
}

/// GET /auth/me - Get current user info
pub async fn auth_me(
    State(state): State<AppState>,
    AuthContextExtractor(ctx): AuthContextExtractor,
) -> Result<Json<UserInfo>> {
    let user_id = ctx
        .user_id
        .ok_or_else(|| SensorboardError::Unauthorized("Not authenticated".to_string()))?;

    let user = state
        .users
        .find_by_id(&user_id)
        .ok_or_else(|| SensorboardError::NotFound("User not found".to_string()))?;
    Ok(Json(UserInfo::from(&user)))
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| SensorboardError::InternalError(format!("Invalid cookie: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}
