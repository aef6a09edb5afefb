use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::backend::{
    CacheBackend, DisabledBackend, MemoryBackend, MemoryConfig, RedisBackend, RedisConfig,
};

/// Main server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: Server,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process TTL store
    Memory,
    Redis,
    /// Every cache call fails softly; routes always run their handler
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_url: String,
    pub default_ttl_secs: u64,
    /// Per-call bound on Redis I/O
    pub io_timeout_ms: u64,
    pub max_memory_mb: usize,
    pub ttl_cleanup_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_secs: u64,
    /// Bootstrap admin, created when no admin account exists
    pub admin_username: String,
    pub admin_password: String,
    /// Reject every anonymous request, public endpoints included
    pub require_auth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            redis_url: RedisConfig::default().url,
            default_ttl_secs: 300,
            io_timeout_ms: 500,
            max_memory_mb: 256,
            ttl_cleanup_interval_ms: 1000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 7 * 24 * 3600,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            require_auth: false,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.default_ttl_secs == 0 {
            anyhow::bail!("cache.default_ttl_secs must be greater than 0");
        }
        if self.cache.io_timeout_ms == 0 {
            anyhow::bail!("cache.io_timeout_ms must be greater than 0");
        }
        if self.cache.ttl_cleanup_interval_ms == 0 {
            anyhow::bail!("cache.ttl_cleanup_interval_ms must be greater than 0");
        }
        if self.auth.session_ttl_secs == 0 {
            anyhow::bail!("auth.session_ttl_secs must be greater than 0");
        }
        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.session_ttl_secs)
    }

    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            max_memory_mb: self.cache.max_memory_mb,
            ttl_cleanup_interval_ms: self.cache.ttl_cleanup_interval_ms,
        }
    }

    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.cache.redis_url.clone(),
            io_timeout_ms: self.cache.io_timeout_ms,
        }
    }

    /// Build the configured cache backend.
    ///
    /// The in-process backend starts its TTL sweeper, so this must run inside
    /// a tokio runtime. A Redis URL that fails to parse is an error; an
    /// unreachable Redis server is not.
    pub fn build_backend(&self) -> anyhow::Result<Arc<dyn CacheBackend>> {
        let backend: Arc<dyn CacheBackend> = match self.cache.backend {
            CacheBackendKind::Memory => {
                let backend = Arc::new(MemoryBackend::new(self.memory_config()));
                backend.start_ttl_cleanup();
                backend
            }
            CacheBackendKind::Redis => Arc::new(RedisBackend::new(&self.redis_config())?),
            CacheBackendKind::Disabled => {
                warn!("Response cache disabled by configuration");
                Arc::new(DisabledBackend)
            }
        };
        info!("Cache backend: {}", backend.name());
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:5000");
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
server:
  port: 8080
cache:
  backend: redis
  redis_url: "redis://cache:6379/1"
logging:
  format: json
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.redis_config().url, "redis://cache:6379/1");
        assert_eq!(config.cache.io_timeout_ms, 500);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.auth.admin_username, "admin");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"cache:\n  default_ttl_secs: 0\n").unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"cache:\n  ttl_cleanup_interval_ms: 0\n").unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"cache:\n  backend: memcached\n").unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_build_backend() {
        let backend = ServerConfig::default().build_backend().unwrap();
        assert_eq!(backend.name(), "memory");

        let mut config = ServerConfig::default();
        config.cache.backend = CacheBackendKind::Disabled;
        let backend = config.build_backend().unwrap();
        assert!(backend.ping().await.is_err());

        config.cache.backend = CacheBackendKind::Redis;
        config.cache.redis_url = "not a url".to_string();
        assert!(config.build_backend().is_err());
    }
}
