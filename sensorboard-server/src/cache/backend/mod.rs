//! Key-value backends behind the cache store

pub mod disabled;
pub mod memory;
pub mod pattern;
pub mod redis;

pub use disabled::DisabledBackend;
pub use self::memory::{MemoryBackend, MemoryConfig};
pub use self::redis::{RedisBackend, RedisConfig};
pub use pattern::glob_match;

use super::error::CacheResult;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Server facts reported by `info()`
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BackendInfo {
    /// Human readable memory in use (e.g. `1.02M`)
    pub used_memory_human: Option<String>,
    /// Human readable peak memory
    pub used_memory_peak_human: Option<String>,
    pub uptime_in_seconds: u64,
}

/// Operations the cache layer needs from a key-value server.
///
/// Implementations report failures as errors; deciding how to degrade is
/// left to the store adapter.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name for logs and stats
    fn name(&self) -> &'static str;

    async fn ping(&self) -> CacheResult<()>;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl`
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Keys matching a Redis glob pattern (`*`, `?`, `[...]`, escapes)
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> CacheResult<usize>;

    /// Drop every key in the keyspace
    async fn flush(&self) -> CacheResult<()>;

    async fn info(&self) -> CacheResult<BackendInfo>;

    async fn db_size(&self) -> CacheResult<usize>;
}

/// Format a byte count the way Redis renders `used_memory_human`
pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];

    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = "B";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }
    format!("{:.2}{}", value, unit)
}
