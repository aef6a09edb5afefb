//! Response caching
//!
//! - [`key`]: deterministic key derivation (`route:` / `cache:` namespaces)
//! - [`backend`]: key-value servers (in-process, Redis, disabled)
//! - [`store`]: soft-failing adapter over a backend
//! - [`wrapper`] and [`middleware`]: cache-aware handler invocation
//! - [`function`]: function-result caching
//! - [`admin`]: stats and invalidation for operators

pub mod admin;
pub mod backend;
pub mod error;
pub mod function;
pub mod key;
pub mod middleware;
pub mod store;
pub mod wrapper;

pub use admin::{CacheAdmin, CacheStats};
pub use backend::{CacheBackend, DisabledBackend, MemoryBackend, RedisBackend};
pub use error::{CacheError, CacheResult};
pub use function::FunctionCache;
pub use key::{CacheKey, Caller, Namespace};
pub use middleware::{X_CACHE, cached_route};
pub use store::{CacheStore, Cleared};
pub use wrapper::{CacheOutcome, Cacheable, CachedHandler, DEFAULT_TTL, Reply, ResponseCache, RouteRequest};
