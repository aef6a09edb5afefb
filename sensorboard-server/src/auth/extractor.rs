//! Axum extractor for AuthContext
//!
//! Provides an extractor to access AuthContext in handlers, the role checks
//! handlers call, and a route layer rejecting anonymous callers.

use super::{Action, AuthContext};
use crate::core::SensorboardError;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Extract AuthContext from request extensions
///
/// This extractor retrieves the AuthContext that was set by AuthMiddleware.
/// If no AuthContext is found, it returns a 500 Internal Server Error
/// (which should not happen if middleware is properly configured).
pub struct AuthContextExtractor(pub AuthContext);

impl<S> axum::extract::FromRequestParts<S> for AuthContextExtractor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AuthContext not found in request extensions",
                )
                    .into_response()
            })
    }
}

/// Require an authenticated caller
pub fn require_auth(ctx: &AuthContext) -> Result<(), SensorboardError> {
    if ctx.is_authenticated() {
        Ok(())
    } else {
        Err(SensorboardError::Unauthorized(
            "Authentication required".to_string(),
        ))
    }
}

/// Require the admin role
pub fn require_admin(ctx: &AuthContext) -> Result<(), SensorboardError> {
    require_auth(ctx)?;
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(SensorboardError::Forbidden(
            "Admin access required".to_string(),
        ))
    }
}

/// Require a role allowing `action`
pub fn require_action(ctx: &AuthContext, action: Action) -> Result<(), SensorboardError> {
    require_auth(ctx)?;
    if ctx.can(action) {
        Ok(())
    } else {
        Err(SensorboardError::Forbidden(format!(
            "Insufficient permissions for action: {}",
            action.as_str()
        )))
    }
}

/// Route layer rejecting requests without an authenticated session.
///
/// Mount it outside any cache layer so cached responses are never served to
/// anonymous callers.
pub async fn require_session(req: Request, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<AuthContext>()
        .is_some_and(AuthContext::is_authenticated);

    if !authenticated {
        return SensorboardError::Unauthorized("Authentication required".to_string())
            .into_response();
    }
    next.run(req).await
}
