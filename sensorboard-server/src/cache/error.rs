use thiserror::Error;

/// Errors raised by cache backends.
///
/// None of these reach an HTTP caller: the [`CacheStore`](super::CacheStore)
/// adapter turns each of them into a miss or a no-op.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache backend timed out after {0}ms")]
    Timeout(u64),

    #[error("Cache backend memory limit exceeded")]
    MemoryLimitExceeded,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
