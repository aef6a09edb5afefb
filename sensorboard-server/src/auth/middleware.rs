use super::{AuthContext, SESSION_COOKIE, SessionManager, UserManager};
use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose};
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// Authentication middleware
#[derive(Clone)]
pub struct AuthMiddleware {
    pub user_manager: UserManager,
    pub session_manager: SessionManager,
    pub require_auth: bool,
}

impl AuthMiddleware {
    pub fn new(
        user_manager: UserManager,
        session_manager: SessionManager,
        require_auth: bool,
    ) -> Self {
        Self {
            user_manager,
            session_manager,
            require_auth,
        }
    }

    /// Extract client IP from request
    fn get_client_ip(req: &Request) -> IpAddr {
        if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
            return addr.ip();
        }

        IpAddr::from([127, 0, 0, 1])
    }

    /// Middleware function for Axum
    pub async fn layer(
        auth: AuthMiddleware,
        mut req: Request,
        next: Next,
    ) -> Result<Response, StatusCode> {
        let client_ip = Self::get_client_ip(&req);
        debug!("Processing authentication for IP: {}", client_ip);

        // Session cookie or bearer token first
        if let Some(auth_context) = Self::authenticate_session(&auth, req.headers(), client_ip) {
            req.extensions_mut().insert(auth_context);
            return Ok(next.run(req).await);
        }

        if let Some(auth_context) = Self::authenticate_basic(&auth, req.headers(), client_ip) {
            req.extensions_mut().insert(auth_context);
            return Ok(next.run(req).await);
        }

        if auth.require_auth {
            debug!("Authentication required but not provided");
            return Err(StatusCode::UNAUTHORIZED);
        }

        req.extensions_mut()
            .insert(AuthContext::anonymous(client_ip));
        Ok(next.run(req).await)
    }

    /// Authenticate via session token
    fn authenticate_session(
        auth: &AuthMiddleware,
        headers: &HeaderMap,
        client_ip: IpAddr,
    ) -> Option<AuthContext> {
        let token = session_cookie(headers).or_else(|| bearer_token(headers))?;
        let session = auth.session_manager.validate(token)?;

        // Role and active flag are read per request so admin changes apply immediately
        let user = auth.user_manager.find_by_id(&session.user_id)?;
        if !user.active {
            debug!("Session of inactive user {} rejected", user.username);
            return None;
        }

        debug!("Authenticated via session: {}", user.username);
        Some(AuthContext::user(user.id, user.username, user.role, client_ip).with_session(token))
    }

    /// Authenticate via Basic Auth
    fn authenticate_basic(
        auth: &AuthMiddleware,
        headers: &HeaderMap,
        client_ip: IpAddr,
    ) -> Option<AuthContext> {
        let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let credentials = auth_str.strip_prefix("Basic ")?;

        let decoded = general_purpose::STANDARD.decode(credentials).ok()?;
        let credentials_str = String::from_utf8(decoded).ok()?;

        let (username, password) = credentials_str.split_once(':')?;

        match auth.user_manager.authenticate(username, password) {
            Ok(user) => {
                debug!("Authenticated via Basic Auth: {}", username);
                Some(AuthContext::user(user.id, user.username, user.role, client_ip))
            }
            Err(_) => None,
        }
    }
}

/// Value of the session cookie, if present
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
