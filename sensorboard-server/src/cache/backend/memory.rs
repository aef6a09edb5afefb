use super::{BackendInfo, CacheBackend, glob_match, human_bytes};
use crate::cache::error::{CacheError, CacheResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the in-process backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum memory in MB
    pub max_memory_mb: usize,
    /// Expired-entry sweep interval in milliseconds
    pub ttl_cleanup_interval_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 256,
            ttl_cleanup_interval_ms: 1000,
        }
    }
}

/// Stored value with its expiration
#[derive(Debug, Clone)]
struct StoredValue {
    data: String,
    expires_at: Instant,
}

impl StoredValue {
    fn new(data: String, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct MemoryStats {
    memory_bytes: usize,
    peak_memory_bytes: usize,
}

/// In-process TTL store using a radix trie, the default cache backend.
///
/// Expired entries are never returned: reads check the deadline and drop
/// the entry, and a background sweep reclaims the rest.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<Trie<String, StoredValue>>>,
    stats: Arc<RwLock<MemoryStats>>,
    config: MemoryConfig,
    started_at: Instant,
}

impl MemoryBackend {
    pub fn new(config: MemoryConfig) -> Self {
        info!(
            "Initializing in-memory cache backend with max_memory={}MB",
            config.max_memory_mb
        );

        Self {
            data: Arc::new(RwLock::new(Trie::new())),
            stats: Arc::new(RwLock::new(MemoryStats::default())),
            config,
            started_at: Instant::now(),
        }
    }

    /// Start background TTL cleanup task
    pub fn start_ttl_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let interval_ms = self.config.ttl_cleanup_interval_ms;
        info!("Starting cache TTL cleanup task (interval={}ms)", interval_ms);

        let backend = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));

            loop {
                interval.tick().await;
                backend.cleanup_expired();
            }
        })
    }

    fn cleanup_expired(&self) {
        let mut data = self.data.write();

        let expired: Vec<String> = data
            .iter()
            .filter(|(_, v)| v.is_expired())
            .map(|(k, _)| k.clone())
            .collect();

        if expired.is_empty() {
            return;
        }

        debug!("Cleaning up {} expired cache keys", expired.len());
        let mut stats = self.stats.write();
        for key in expired {
            if let Some(old) = data.remove(&key) {
                stats.memory_bytes = stats
                    .memory_bytes
                    .saturating_sub(Self::entry_size(&key, &old.data));
            }
        }
    }

    fn entry_size(key: &str, data: &str) -> usize {
        key.len() + data.len() + std::mem::size_of::<StoredValue>()
    }

    /// Keys that are live right now, optionally narrowed by a literal prefix
    fn live_keys(&self, prefix: Option<&str>) -> Vec<String> {
        let data = self.data.read();
        match prefix {
            Some(prefix) => data
                .get_raw_descendant(prefix)
                .map(|subtrie| {
                    subtrie
                        .iter()
                        .filter(|(_, v)| !v.is_expired())
                        .map(|(k, _)| k.clone())
                        .collect()
                })
                .unwrap_or_default(),
            None => data
                .iter()
                .filter(|(_, v)| !v.is_expired())
                .map(|(k, _)| k.clone())
                .collect(),
        }
    }
}

/// Literal text before the first glob metacharacter
fn literal_prefix(pattern: &str) -> &str {
    let end = pattern
        .find(['*', '?', '\\', '['])
        .unwrap_or(pattern.len());
    &pattern[..end]
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        {
            let data = self.data.read();
            match data.get(key) {
                Some(value) if !value.is_expired() => return Ok(Some(value.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        debug!("Cache key expired: {}", key);
        let mut data = self.data.write();
        if let Some(old) = data.remove(key) {
            let mut stats = self.stats.write();
            stats.memory_bytes = stats
                .memory_bytes
                .saturating_sub(Self::entry_size(key, &old.data));
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let entry_size = Self::entry_size(key, &value);
        let max_bytes = self.config.max_memory_mb * 1024 * 1024;

        let mut data = self.data.write();
        let mut stats = self.stats.write();

        // An overwrite releases the bytes of the entry it replaces
        let replaced_size = data
            .get(key)
            .map(|old| Self::entry_size(key, &old.data))
            .unwrap_or(0);
        let projected = stats.memory_bytes.saturating_sub(replaced_size) + entry_size;
        if projected > max_bytes {
            warn!(
                "Cache memory limit exceeded: {}/{}",
                stats.memory_bytes, max_bytes
            );
            return Err(CacheError::MemoryLimitExceeded);
        }

        data.insert(key.to_string(), StoredValue::new(value, ttl));
        stats.memory_bytes = projected;
        stats.peak_memory_bytes = stats.peak_memory_bytes.max(stats.memory_bytes);

        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let prefix = literal_prefix(pattern);
        let candidates = self.live_keys((!prefix.is_empty()).then_some(prefix));

        Ok(candidates
            .into_iter()
            .filter(|k| glob_match(pattern, k))
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<usize> {
        let mut data = self.data.write();
        let mut stats = self.stats.write();

        let mut count = 0;
        for key in keys {
            if let Some(old) = data.remove(key) {
                stats.memory_bytes = stats
                    .memory_bytes
                    .saturating_sub(Self::entry_size(key, &old.data));
                if !old.is_expired() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn flush(&self) -> CacheResult<()> {
        *self.data.write() = Trie::new();
        self.stats.write().memory_bytes = 0;
        Ok(())
    }

    async fn info(&self) -> CacheResult<BackendInfo> {
        let stats = self.stats.read();
        Ok(BackendInfo {
            used_memory_human: Some(human_bytes(stats.memory_bytes)),
            used_memory_peak_human: Some(human_bytes(stats.peak_memory_bytes)),
            uptime_in_seconds: self.started_at.elapsed().as_secs(),
        })
    }

    async fn db_size(&self) -> CacheResult<usize> {
        Ok(self.live_keys(None).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(MemoryConfig::default())
    }

    #[tokio::test]
    async fn test_set_get() {
        let store = backend();
        store
            .set_ex("route:a", "{\"x\":1}".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let result = store.get("route:a").await.unwrap();
        assert_eq!(result.as_deref(), Some("{\"x\":1}"));
        assert_eq!(store.get("route:b").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiration() {
        let store = backend();
        store
            .set_ex("key1", "value1".into(), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("key1").await.unwrap(), None);
        assert_eq!(store.db_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_pattern() {
        let store = backend();
        let ttl = Duration::from_secs(60);
        store.set_ex("route:a:/x", "1".into(), ttl).await.unwrap();
        store.set_ex("route:b:/y", "2".into(), ttl).await.unwrap();
        store.set_ex("cache:f:1", "3".into(), ttl).await.unwrap();

        let mut keys = store.keys("route:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["route:a:/x", "route:b:/y"]);

        assert_eq!(store.keys("*").await.unwrap().len(), 3);
        assert_eq!(store.keys("*:/y").await.unwrap(), vec!["route:b:/y"]);
        assert!(store.keys("nothing:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_flush() {
        let store = backend();
        let ttl = Duration::from_secs(60);
        store.set_ex("k1", "1".into(), ttl).await.unwrap();
        store.set_ex("k2", "2".into(), ttl).await.unwrap();
        store.set_ex("k3", "3".into(), ttl).await.unwrap();

        let deleted = store
            .delete(&["k1".to_string(), "k2".to_string(), "k9".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.db_size().await.unwrap(), 1);

        store.flush().await.unwrap();
        assert_eq!(store.db_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_accounting() {
        let store = backend();
        let ttl = Duration::from_secs(60);
        store.set_ex("k", "a".repeat(2048), ttl).await.unwrap();
        store.set_ex("k", "b".into(), ttl).await.unwrap();

        let stats = store.stats.read();
        assert_eq!(stats.memory_bytes, MemoryBackend::entry_size("k", "b"));
        assert!(stats.peak_memory_bytes >= MemoryBackend::entry_size("k", &"a".repeat(2048)));
    }

    #[tokio::test]
    async fn test_memory_limit() {
        let store = MemoryBackend::new(MemoryConfig {
            max_memory_mb: 0,
            ttl_cleanup_interval_ms: 1000,
        });
        let result = store
            .set_ex("k", "v".into(), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(CacheError::MemoryLimitExceeded)));
    }

    #[tokio::test]
    async fn test_overwrite_near_limit() {
        let store = MemoryBackend::new(MemoryConfig {
            max_memory_mb: 1,
            ttl_cleanup_interval_ms: 1000,
        });
        let ttl = Duration::from_secs(60);
        store.set_ex("k", "a".repeat(600 * 1024), ttl).await.unwrap();

        store.set_ex("k", "b".repeat(600 * 1024), ttl).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().as_bytes()[0], b'b');

        let result = store.set_ex("other", "c".repeat(600 * 1024), ttl).await;
        assert!(matches!(result, Err(CacheError::MemoryLimitExceeded)));
        assert_eq!(
            store.stats.read().memory_bytes,
            MemoryBackend::entry_size("k", &"b".repeat(600 * 1024))
        );
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("route:*"), "route:");
        assert_eq!(literal_prefix("*"), "");
        assert_eq!(literal_prefix("cache:a?b"), "cache:a");
        assert_eq!(literal_prefix("plain"), "plain");
        assert_eq!(literal_prefix("route:get_[a-m]*"), "route:get_");
    }
}
