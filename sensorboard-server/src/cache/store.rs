use super::backend::{BackendInfo, CacheBackend};
use super::error::CacheResult;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a successful `delete_matching`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum Cleared {
    /// No pattern given: the whole keyspace was flushed
    All { keys_deleted: usize },
    /// Keys matching the pattern were deleted
    Matched { keys_deleted: usize },
}

impl Cleared {
    pub fn keys_deleted(&self) -> usize {
        match self {
            Cleared::All { keys_deleted } | Cleared::Matched { keys_deleted } => *keys_deleted,
        }
    }
}

/// Soft-failing adapter over a [`CacheBackend`].
///
/// Backend errors never escape: `get` reports a miss, `set` does nothing and
/// `delete_matching` returns `None`. Callers keep working, only slower.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Stored JSON value, or `None` on miss, backend failure or malformed data
    pub async fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache get failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Store `value` as JSON with the given TTL.
    ///
    /// A value that cannot be encoded as JSON is stored as a JSON string of its
    /// `Debug` form, which is lossy.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize + Debug + ?Sized,
    {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Cache value for {} is not JSON ({}), storing text form", key, e);
                match serde_json::to_string(&format!("{:?}", value)) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("Skipping cache write for {}: {}", key, e);
                        return;
                    }
                }
            }
        };

        if let Err(e) = self.backend.set_ex(key, encoded, ttl).await {
            warn!("Cache set failed for {}: {}", key, e);
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(&[key.to_string()]).await {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("Cache delete failed for {}: {}", key, e);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        matches!(self.backend.get(key).await, Ok(Some(_)))
    }

    /// Delete keys matching a glob pattern, or flush everything when no
    /// pattern is given. `None` means the backend could not be reached.
    pub async fn delete_matching(&self, pattern: Option<&str>) -> Option<Cleared> {
        let result = match pattern {
            Some(pattern) => self.delete_pattern(pattern).await,
            None => self.flush_all().await,
        };

        match result {
            Ok(cleared) => {
                debug!("Cache cleared pattern={:?}: {:?}", pattern, cleared);
                Some(cleared)
            }
            Err(e) => {
                warn!("Cache clear failed for pattern {:?}: {}", pattern, e);
                None
            }
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<Cleared> {
        let keys = self.backend.keys(pattern).await?;
        let keys_deleted = if keys.is_empty() {
            0
        } else {
            self.backend.delete(&keys).await?
        };
        Ok(Cleared::Matched { keys_deleted })
    }

    async fn flush_all(&self) -> CacheResult<Cleared> {
        let keys_deleted = self.backend.db_size().await?;
        self.backend.flush().await?;
        Ok(Cleared::All { keys_deleted })
    }

    /// Raw backend facts for the admin surface; errors are passed through
    pub(crate) async fn info(&self) -> CacheResult<(BackendInfo, usize)> {
        self.backend.ping().await?;
        let info = self.backend.info().await?;
        let size = self.backend.db_size().await?;
        Ok((info, size))
    }

    pub(crate) async fn count_matching(&self, pattern: &str) -> CacheResult<usize> {
        Ok(self.backend.keys(pattern).await?.len())
    }
}
