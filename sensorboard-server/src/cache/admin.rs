use super::key::Namespace;
use super::store::{CacheStore, Cleared};
use crate::auth::{AuthContext, extractor::require_admin};
use crate::core::Result;
use serde::Serialize;
use tracing::{info, warn};

/// Cache statistics as reported to operators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheStats {
    Connected {
        connected: bool,
        backend: &'static str,
        memory_used: String,
        memory_peak: String,
        keys_count: usize,
        cache_keys: usize,
        route_keys: usize,
        uptime_seconds: u64,
    },
    Disconnected {
        connected: bool,
        backend: &'static str,
        error: String,
    },
}

impl CacheStats {
    pub fn is_connected(&self) -> bool {
        matches!(self, CacheStats::Connected { .. })
    }
}

/// Operator-facing cache surface: stats and invalidation
#[derive(Clone)]
pub struct CacheAdmin {
    store: CacheStore,
}

impl CacheAdmin {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Backend reachability and key counts; never fails
    pub async fn stats(&self) -> CacheStats {
        let backend = self.store.backend().name();

        let collected = async {
            let (info, keys_count) = self.store.info().await?;
            let cache_keys = self
                .store
                .count_matching(&Namespace::Function.pattern())
                .await?;
            let route_keys = self.store.count_matching(&Namespace::Route.pattern()).await?;
            Ok::<_, super::CacheError>((info, keys_count, cache_keys, route_keys))
        }
        .await;

        match collected {
            Ok((info, keys_count, cache_keys, route_keys)) => CacheStats::Connected {
                connected: true,
                backend,
                memory_used: info.used_memory_human.unwrap_or_else(|| "N/A".to_string()),
                memory_peak: info
                    .used_memory_peak_human
                    .unwrap_or_else(|| "N/A".to_string()),
                keys_count,
                cache_keys,
                route_keys,
                uptime_seconds: info.uptime_in_seconds,
            },
            Err(e) => {
                warn!("Cache stats unavailable: {}", e);
                CacheStats::Disconnected {
                    connected: false,
                    backend,
                    error: format!("Cannot connect to cache backend: {}", e),
                }
            }
        }
    }

    /// Delete keys matching `pattern`, or everything when `None`.
    ///
    /// Admin only. `Ok(None)` means the backend could not be reached.
    pub async fn clear(&self, ctx: &AuthContext, pattern: Option<&str>) -> Result<Option<Cleared>> {
        require_admin(ctx)?;

        info!(
            "Cache clear requested by {:?} pattern={:?}",
            ctx.username, pattern
        );
        Ok(self.store.delete_matching(pattern).await)
    }
}
