use super::{BackendInfo, CacheBackend};
use crate::cache::error::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the Redis backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// e.g. `redis://redis:6379/0`
    pub url: String,
    /// Upper bound for connecting plus running one command
    pub io_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            io_timeout_ms: 500,
        }
    }
}

/// Redis-backed cache.
///
/// Each call acquires its own connection from the client and releases it when
/// the call returns; no connection handle is shared between requests.
/// Connect and command share one deadline of `io_timeout_ms`.
#[derive(Clone)]
pub struct RedisBackend {
    client: redis::Client,
    io_timeout: Duration,
}

impl RedisBackend {
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        info!("Initializing Redis cache backend at {}", config.url);
        let client = redis::Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            io_timeout: Duration::from_millis(config.io_timeout_ms),
        })
    }

    /// Acquire a connection, run `op` on it, all under the I/O deadline
    async fn with_connection<T, F, Fut>(&self, op: F) -> CacheResult<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let work = async {
            let conn = self.client.get_multiplexed_async_connection().await?;
            op(conn).await
        };

        match tokio::time::timeout(self.io_timeout, work).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.io_timeout.as_millis() as u64)),
        }
    }
}

/// Pull `field` out of an INFO reply (`field:value` lines)
fn info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines().find_map(|line| {
        line.trim_end()
            .strip_prefix(field)
            .and_then(|rest| rest.strip_prefix(':'))
    })
}

fn parse_info(raw: &str) -> BackendInfo {
    BackendInfo {
        used_memory_human: info_field(raw, "used_memory_human").map(str::to_string),
        used_memory_peak_human: info_field(raw, "used_memory_peak_human").map(str::to_string),
        uptime_in_seconds: info_field(raw, "uptime_in_seconds")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> CacheResult<()> {
        self.with_connection(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        debug!("Redis GET {}", key);
        self.with_connection(|mut conn| async move {
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        debug!("Redis SETEX {} ttl={}s", key, ttl.as_secs());
        let seconds = ttl.as_secs().max(1);
        self.with_connection(|mut conn| async move {
            let _: () = conn.set_ex(key, value, seconds).await?;
            Ok(())
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.with_connection(|mut conn| async move {
            let keys: Vec<String> = conn.keys(pattern).await?;
            Ok(keys)
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.to_vec();
        self.with_connection(|mut conn| async move {
            let count: usize = conn.del(keys).await?;
            Ok(count)
        })
        .await
    }

    async fn flush(&self) -> CacheResult<()> {
        self.with_connection(|mut conn| async move {
            let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn info(&self) -> CacheResult<BackendInfo> {
        let raw = self
            .with_connection(|mut conn| async move {
                let raw: String = redis::cmd("INFO").query_async(&mut conn).await?;
                Ok(raw)
            })
            .await?;
        Ok(parse_info(&raw))
    }

    async fn db_size(&self) -> CacheResult<usize> {
        self.with_connection(|mut conn| async move {
            let size: usize = redis::cmd("DBSIZE").query_async(&mut conn).await?;
            Ok(size)
        })
        .await
    }
}
