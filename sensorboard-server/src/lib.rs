pub mod auth;
pub mod cache;
pub mod config;
pub mod core;
pub mod metrics;
pub mod readings;
pub mod server;

// Re-export commonly used types
pub use auth::{Action, AuthContext, AuthMiddleware, Role, SessionManager, User, UserManager};
pub use cache::{
    CacheAdmin, CacheBackend, CacheOutcome, CacheStats, CacheStore, Cleared, FunctionCache,
    ResponseCache,
};
pub use config::ServerConfig;
pub use core::{Result, SensorboardError};
pub use metrics::init_metrics;
pub use readings::ReadingStore;
pub use server::{AppState, create_router};
