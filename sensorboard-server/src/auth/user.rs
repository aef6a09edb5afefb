use super::{AuthResult, Role};
use crate::core::SensorboardError;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Minimum username length accepted at registration
pub const MIN_USERNAME_LEN: usize = 3;
/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable user id, used as the caller identity in cache keys
    pub id: String,
    /// Unique username
    pub username: String,
    pub email: String,
    /// Hashed password (bcrypt)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Account enabled
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user with password
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        role: Role,
    ) -> AuthResult<Self> {
        let password_hash = hash(password, DEFAULT_COST).map_err(|e| {
            SensorboardError::InternalError(format!("Failed to hash password: {}", e))
        })?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash,
            role,
            active: true,
            created_at: Utc::now(),
            last_login: None,
        })
    }

    /// Verify password
    pub fn verify_password(&self, password: &str) -> bool {
        verify(password, &self.password_hash).unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Registration form as submitted by a client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl Registration {
    pub fn validate(&self) -> AuthResult<()> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(SensorboardError::InvalidRequest(
                "All fields are required".to_string(),
            ));
        }
        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(SensorboardError::InvalidRequest(format!(
                "Username must be at least {} characters",
                MIN_USERNAME_LEN
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SensorboardError::InvalidRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.password != self.password_confirm {
            return Err(SensorboardError::InvalidRequest(
                "Passwords do not match".to_string(),
            ));
        }
        Ok(())
    }
}

/// User manager - handles user authentication and management
#[derive(Clone, Default)]
pub struct UserManager {
    /// Keyed by username
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl UserManager {
    pub fn new() -> Self {
        info!("Initializing User Manager");
        Self::default()
    }

    /// Create the bootstrap admin if no admin account exists
    pub fn ensure_admin_exists(&self, username: &str, password: &str) -> AuthResult<()> {
        if self.users.read().values().any(User::is_admin) {
            return Ok(());
        }

        info!("Creating default admin user: {}", username);
        let admin = User::new(username, format!("{}@localhost", username), password, Role::Admin)?;
        self.users.write().insert(username.to_string(), admin);
        Ok(())
    }

    /// Create a new user
    pub fn create_user(
        &self,
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        role: Role,
    ) -> AuthResult<User> {
        let username = username.into();
        let email = email.into();
        debug!("Creating user: {}", username);

        let mut users = self.users.write();

        if users.contains_key(&username) {
            return Err(SensorboardError::AlreadyExists(format!(
                "Username {} already exists",
                username
            )));
        }
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(SensorboardError::AlreadyExists(format!(
                "Email {} already registered",
                email
            )));
        }

        let user = User::new(&username, email, password, role)?;
        users.insert(username, user.clone());
        Ok(user)
    }

    /// Self-service registration; new accounts are viewers
    pub fn register(&self, form: &Registration) -> AuthResult<User> {
        form.validate()?;
        self.create_user(
            form.username.trim(),
            form.email.trim(),
            &form.password,
            Role::Viewer,
        )
    }

    /// Authenticate user with username/password
    pub fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        debug!("Authenticating user: {}", username);

        let mut users = self.users.write();

        let user = users
            .get_mut(username)
            .ok_or_else(|| SensorboardError::Unauthorized("Invalid credentials".to_string()))?;

        if !user.verify_password(password) {
            return Err(SensorboardError::Unauthorized(
                "Invalid credentials".to_string(),
            ));
        }

        if !user.active {
            return Err(SensorboardError::Unauthorized(
                "User not found or inactive".to_string(),
            ));
        }

        user.last_login = Some(Utc::now());
        Ok(user.clone())
    }

    /// Get user by username
    pub fn get_user(&self, username: &str) -> Option<User> {
        self.users.read().get(username).cloned()
    }

    /// Get user by id
    pub fn find_by_id(&self, id: &str) -> Option<User> {
        self.users.read().values().find(|u| u.id == id).cloned()
    }

    /// All users, ordered by username
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    pub fn set_role(&self, username: &str, role: Role) -> AuthResult<User> {
        debug!("Setting role of {} to {}", username, role);
        self.update(username, |user| user.role = role)
    }

    /// Enable/disable user
    pub fn set_active(&self, username: &str, active: bool) -> AuthResult<User> {
        debug!("Setting user {} active: {}", username, active);
        self.update(username, |user| user.active = active)
    }

    fn update(&self, username: &str, apply: impl FnOnce(&mut User)) -> AuthResult<User> {
        let mut users = self.users.write();
        let user = users
            .get_mut(username)
            .ok_or_else(|| SensorboardError::NotFound(format!("User {} not found", username)))?;
        apply(user);
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, password: &str, confirm: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_create_user() {
        let user = User::new("alice", "alice@example.com", "password123", Role::Analyst).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.active);
        assert!(user.verify_password("password123"));
        assert!(!user.verify_password("wrong"));
        assert!(!user.is_admin());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("bob", "bob@example.com", "secret99", Role::Viewer).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "viewer");
    }

    #[test]
    fn test_user_manager_authenticate() {
        let manager = UserManager::new();
        manager
            .create_user("carol", "carol@example.com", "pass1234", Role::Viewer)
            .unwrap();

        let user = manager.authenticate("carol", "pass1234").unwrap();
        assert!(user.last_login.is_some());
        assert!(manager.authenticate("carol", "nope").is_err());
        assert!(manager.authenticate("nobody", "pass1234").is_err());
    }

    #[test]
    fn test_duplicate_username_and_email() {
        let manager = UserManager::new();
        manager
            .create_user("dave", "dave@example.com", "pass1234", Role::Viewer)
            .unwrap();

        let dup_name = manager.create_user("dave", "other@example.com", "pass1234", Role::Viewer);
        assert!(matches!(dup_name, Err(SensorboardError::AlreadyExists(_))));

        let dup_mail = manager.create_user("dave2", "DAVE@example.com", "pass1234", Role::Viewer);
        assert!(matches!(dup_mail, Err(SensorboardError::AlreadyExists(_))));
    }

    #[test]
    fn test_deactivated_user_cannot_login() {
        let manager = UserManager::new();
        manager
            .create_user("erin", "erin@example.com", "pass1234", Role::Analyst)
            .unwrap();
        manager.set_active("erin", false).unwrap();

        assert!(manager.authenticate("erin", "pass1234").is_err());

        manager.set_active("erin", true).unwrap();
        assert!(manager.authenticate("erin", "pass1234").is_ok());
    }

    #[test]
    fn test_set_role_and_lookup() {
        let manager = UserManager::new();
        let user = manager
            .create_user("frank", "frank@example.com", "pass1234", Role::Viewer)
            .unwrap();

        manager.set_role("frank", Role::Analyst).unwrap();
        assert_eq!(manager.find_by_id(&user.id).unwrap().role, Role::Analyst);
        assert!(manager.set_role("ghost", Role::Admin).is_err());
    }

    #[test]
    fn test_ensure_admin_exists_once() {
        let manager = UserManager::new();
        manager.ensure_admin_exists("admin", "admin123").unwrap();
        manager.ensure_admin_exists("root", "root1234").unwrap();

        let users = manager.list_users();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin());
    }

    #[test]
    fn test_registration_rules() {
        assert!(registration("ab", "secret1", "secret1").validate().is_err());
        assert!(registration("abc", "short", "short").validate().is_err());
        assert!(registration("abc", "secret1", "secret2").validate().is_err());
        assert!(registration("abc", "secret1", "secret1").validate().is_ok());

        let manager = UserManager::new();
        let user = manager
            .register(&registration("grace", "secret1", "secret1"))
            .unwrap();
        assert_eq!(user.role, Role::Viewer);
    }
}
