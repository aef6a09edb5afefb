use super::key::{CacheKey, Namespace};
use super::store::{CacheStore, Cleared};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Function-result cache under the `cache:` namespace.
///
/// Keys are `cache:<name>:<args...>`. Unlike the route cache there is no
/// method or status gate: whatever the computation returns is stored.
#[derive(Clone)]
pub struct FunctionCache {
    store: CacheStore,
}

impl FunctionCache {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Return the cached result for `name(args)`, computing and storing it on a miss
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        name: &str,
        args: &[&str],
        ttl: Duration,
        compute: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned + Debug,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = CacheKey::function(name, args.iter().copied());

        if let Some(value) = self.get::<T>(key.as_str()).await {
            debug!("Function cache HIT {}", key);
            return value;
        }

        debug!("Function cache MISS {}", key);
        let value = compute().await;
        self.store.set(key.as_str(), &value, ttl).await;
        value
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key).await?;
        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Cached value for {} has a different shape: {}", key, e);
                None
            }
        }
    }

    /// Read `cache:<key>` directly
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(&namespaced(key)).await
    }

    /// Write `cache:<key>` directly
    pub async fn set_value<T>(&self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize + Debug + ?Sized,
    {
        self.store.set(&namespaced(key), value, ttl).await;
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(&namespaced(key)).await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.store.exists(&namespaced(key)).await
    }

    /// Delete function-cache keys matching `pattern` (relative to the namespace)
    pub async fn clear(&self, pattern: &str) -> Option<Cleared> {
        self.store
            .delete_matching(Some(&namespaced(pattern)))
            .await
    }
}

fn namespaced(key: &str) -> String {
    format!("{}:{}", Namespace::Function, key)
}
