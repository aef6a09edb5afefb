pub mod extractor;
pub mod middleware;
pub mod permissions;
pub mod session;
pub mod user;

pub use extractor::{AuthContextExtractor, require_action, require_admin, require_auth};
pub use middleware::AuthMiddleware;
pub use permissions::{Action, Role};
pub use session::{SESSION_COOKIE, Session, SessionManager};
pub use user::{Registration, User, UserManager};

use crate::core::SensorboardError;
use std::net::IpAddr;

/// Authentication result
pub type AuthResult<T> = Result<T, SensorboardError>;

/// Authenticated context
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (if authenticated)
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
    /// Session token the request was authenticated with
    pub session_token: Option<String>,
    /// Client IP address
    pub client_ip: IpAddr,
}

impl AuthContext {
    /// Create a new unauthenticated context
    pub fn anonymous(client_ip: IpAddr) -> Self {
        Self {
            user_id: None,
            username: None,
            role: None,
            session_token: None,
            client_ip,
        }
    }

    /// Create a context for an authenticated user
    pub fn user(
        user_id: impl Into<String>,
        username: impl Into<String>,
        role: Role,
        client_ip: IpAddr,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            username: Some(username.into()),
            role: Some(role),
            session_token: None,
            client_ip,
        }
    }

    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Check if context is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// Check if the caller's role allows an action
    pub fn can(&self, action: Action) -> bool {
        self.role.is_some_and(|role| role.allows(action))
    }
}
