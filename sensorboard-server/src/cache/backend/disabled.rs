use super::{BackendInfo, CacheBackend};
use crate::cache::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::time::Duration;

/// Backend that is never reachable.
///
/// Selected with `cache.backend: disabled`; every wrapped route then runs
/// uncached through the same soft-failure path as an outage.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

fn unavailable<T>() -> CacheResult<T> {
    Err(CacheError::Unavailable("cache disabled".to_string()))
}

#[async_trait]
impl CacheBackend for DisabledBackend {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn ping(&self) -> CacheResult<()> {
        unavailable()
    }

    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        unavailable()
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
        unavailable()
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        unavailable()
    }

    async fn delete(&self, _keys: &[String]) -> CacheResult<usize> {
        unavailable()
    }

    async fn flush(&self) -> CacheResult<()> {
        unavailable()
    }

    async fn info(&self) -> CacheResult<BackendInfo> {
        unavailable()
    }

    async fn db_size(&self) -> CacheResult<usize> {
        unavailable()
    }
}
