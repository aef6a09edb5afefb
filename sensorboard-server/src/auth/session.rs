use super::User;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Login session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Session manager - issues and validates opaque session tokens
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        info!("Initializing Session Manager (ttl={}s)", ttl.as_secs());
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a new session for a user
    pub fn create(&self, user: &User) -> Session {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or(ChronoDuration::MAX);
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        debug!("Session opened for {}", user.username);
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a live session; expired sessions are dropped
    pub fn validate(&self, token: &str) -> Option<Session> {
        let session = self.sessions.read().get(token).cloned()?;
        if session.is_expired() {
            self.sessions.write().remove(token);
            debug!("Session for {} expired", session.username);
            return None;
        }
        Some(session)
    }

    /// Close a session, returns whether it existed
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    /// Close every session of a user
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        before - sessions.len()
    }

    /// Start background task dropping expired sessions
    pub fn start_cleanup(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting session cleanup task (interval={}s)", every.as_secs());

        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;
                let purged = manager.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired sessions", purged);
                }
            }
        })
    }

    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user() -> User {
        User::new("alice", "alice@example.com", "secret1", Role::Viewer).unwrap()
    }

    #[test]
    fn test_create_and_validate() {
        let manager = SessionManager::new(Duration::from_secs(3600));
        let user = user();
        let session = manager.create(&user);

        let found = manager.validate(&session.token).unwrap();
        assert_eq!(found.user_id, user.id);
        assert_eq!(found.username, "alice");
        assert!(manager.validate("not-a-token").is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let manager = SessionManager::new(Duration::from_secs(3600));
        let user = user();
        let a = manager.create(&user);
        let b = manager.create(&user);
        assert_ne!(a.token, b.token);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_expired_session_rejected() {
        let manager = SessionManager::new(Duration::ZERO);
        let session = manager.create(&user());

        assert!(manager.validate(&session.token).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_revoke() {
        let manager = SessionManager::new(Duration::from_secs(3600));
        let user = user();
        let session = manager.create(&user);
        manager.create(&user);

        assert!(manager.revoke(&session.token));
        assert!(!manager.revoke(&session.token));
        assert_eq!(manager.revoke_user(&user.id), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let manager = SessionManager::new(Duration::ZERO);
        manager.create(&user());
        manager.create(&user());
        assert_eq!(manager.purge_expired(), 2);
    }
}
