//! Cache-aware invocation of read handlers
//!
//! Per call: non-GET requests bypass the cache; otherwise the derived key is
//! looked up, a hit returns the stored payload without running the handler,
//! and a miss runs the handler and stores its payload when the status is 200.

use super::key::{CacheKey, Caller};
use super::store::CacheStore;
use crate::metrics;
use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default time-to-live for wrapped routes
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Result contract for handlers that can be cached
pub trait Cacheable: Sized {
    fn status(&self) -> StatusCode;

    /// Payload to store, `None` when the reply has no JSON form
    fn payload(&self) -> Option<&Value>;

    /// Rebuild a reply from a stored payload
    fn from_cached(payload: Value) -> Self;
}

/// A handler result: JSON payload plus status code
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub payload: Value,
    pub status: StatusCode,
}

impl Reply {
    pub fn new(payload: Value, status: StatusCode) -> Self {
        Self { payload, status }
    }

    pub fn ok(payload: Value) -> Self {
        Self::new(payload, StatusCode::OK)
    }
}

impl Cacheable for Reply {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn payload(&self) -> Option<&Value> {
        Some(&self.payload)
    }

    fn from_cached(payload: Value) -> Self {
        Self::ok(payload)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.payload)).into_response()
    }
}

/// What the wrapper did for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Not a read method; cache untouched
    Bypass,
    /// Served from cache; handler skipped
    Hit,
    /// Handler ran; payload stored if it was eligible
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Bypass => "BYPASS",
            CacheOutcome::Hit => "HIT",
            CacheOutcome::Miss => "MISS",
        }
    }
}

/// Request facts that decide caching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub caller: Caller,
}

impl RouteRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: impl Into<String>,
        caller: Caller,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query: query.into(),
            caller,
        }
    }

    pub fn get(path: impl Into<String>, query: impl Into<String>, caller: Caller) -> Self {
        Self::new(Method::GET, path, query, caller)
    }

    pub fn key(&self, operation: &str) -> CacheKey {
        CacheKey::route(operation, &self.path, &self.query, &self.caller)
    }
}

/// Response cache for read routes, backed by an injected [`CacheStore`]
#[derive(Clone)]
pub struct ResponseCache {
    store: CacheStore,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: CacheStore, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Run `handler` for `request` through the cache.
    ///
    /// The handler's own result is always what a miss or bypass returns;
    /// storing it is best effort.
    pub async fn invoke<R, F, Fut>(
        &self,
        operation: &str,
        request: &RouteRequest,
        ttl: Duration,
        handler: F,
    ) -> (R, CacheOutcome)
    where
        R: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        if request.method != Method::GET {
            debug!("Cache BYPASS {} {} {}", operation, request.method, request.path);
            metrics::record_cache_lookup(operation, CacheOutcome::Bypass);
            return (handler().await, CacheOutcome::Bypass);
        }

        let key = request.key(operation);

        if let Some(payload) = self.store.get(key.as_str()).await {
            debug!("Cache HIT {}", key);
            metrics::record_cache_lookup(operation, CacheOutcome::Hit);
            return (R::from_cached(payload), CacheOutcome::Hit);
        }

        debug!("Cache MISS {}", key);
        metrics::record_cache_lookup(operation, CacheOutcome::Miss);
        let reply = handler().await;

        if reply.status() == StatusCode::OK {
            match reply.payload() {
                Some(payload) => self.store.set(key.as_str(), payload, ttl).await,
                None => debug!("Not caching {}: reply has no JSON payload", key),
            }
        } else {
            debug!("Not caching {}: status {}", key, reply.status());
        }

        (reply, CacheOutcome::Miss)
    }

    /// Wrap a handler so every call goes through [`invoke`](Self::invoke)
    pub fn wrap<H>(&self, operation: &'static str, ttl: Duration, handler: H) -> CachedHandler<H> {
        CachedHandler {
            cache: self.clone(),
            operation,
            ttl,
            handler,
        }
    }
}

/// A read handler composed with a [`ResponseCache`]
#[derive(Clone)]
pub struct CachedHandler<H> {
    cache: ResponseCache,
    operation: &'static str,
    ttl: Duration,
    handler: H,
}

impl<H> CachedHandler<H> {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn call<R, Fut>(&self, request: RouteRequest) -> (R, CacheOutcome)
    where
        H: Fn(RouteRequest) -> Fut,
        Fut: Future<Output = R>,
        R: Cacheable,
    {
        let handler_request = request.clone();
        self.cache
            .invoke(self.operation, &request, self.ttl, || {
                (self.handler)(handler_request)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::{CacheBackend, DisabledBackend, MemoryBackend, MemoryConfig};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_cache() -> (ResponseCache, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(MemoryConfig::default()));
        let store = CacheStore::new(backend.clone());
        (ResponseCache::new(store, DEFAULT_TTL), backend)
    }

    fn counting_handler(
        calls: Arc<AtomicUsize>,
        reply: Reply,
    ) -> impl Fn(RouteRequest) -> std::future::Ready<Reply> {
        move |_req| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(reply.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_files_scenario() {
        let (cache, _) = memory_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let files = json!({"files": [{"filename": "sensors.csv"}]});
        let list_files = cache.wrap(
            "list_files",
            Duration::from_secs(300),
            counting_handler(calls.clone(), Reply::ok(files.clone())),
        );
        let request = RouteRequest::get("/api/v1/files", "", Caller::Anonymous);

        let (reply, outcome) = list_files.call(request.clone()).await;
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(reply.payload, files);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(200)).await;
        let (reply, outcome) = list_files.call(request.clone()).await;
        assert_eq!(outcome, CacheOutcome::Hit);
        assert_eq!(reply, Reply::ok(files.clone()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(101)).await;
        let (_, outcome) = list_files.call(request).await;
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_cached_value_falls_through() {
        let (cache, backend) = memory_cache();
        let request = RouteRequest::get("/api/v1/stats", "", Caller::User("u-1".into()));
        let key = request.key("get_stats");
        backend
            .set_ex(key.as_str(), "{not json".into(), DEFAULT_TTL)
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let stats = json!({"total_logs": 3});
        let get_stats = cache.wrap(
            "get_stats",
            DEFAULT_TTL,
            counting_handler(calls.clone(), Reply::ok(stats.clone())),
        );

        let (reply, outcome) = get_stats.call(request.clone()).await;
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(reply.payload, stats);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The fresh payload replaced the malformed entry
        let (_, outcome) = get_stats.call(request).await;
        assert_eq!(outcome, CacheOutcome::Hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_get_always_invokes_and_never_writes() {
        let (cache, backend) = memory_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let search = cache.wrap(
            "search_logs",
            DEFAULT_TTL,
            counting_handler(calls.clone(), Reply::ok(json!({"results": []}))),
        );

        for _ in 0..3 {
            let request = RouteRequest::new(Method::POST, "/search/query", "", Caller::Anonymous);
            let (_, outcome) = search.call(request).await;
            assert_eq!(outcome, CacheOutcome::Bypass);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(backend.db_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_success_status_not_stored() {
        let (cache, backend) = memory_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = cache.wrap(
            "get_stats",
            DEFAULT_TTL,
            counting_handler(
                calls.clone(),
                Reply::new(json!({"error": "index unavailable"}), StatusCode::INTERNAL_SERVER_ERROR),
            ),
        );
        let request = RouteRequest::get("/api/v1/stats", "", Caller::User("u1".into()));

        let (reply, outcome) = failing.call(request.clone()).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome, CacheOutcome::Miss);

        let (_, outcome) = failing.call(request).await;
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.db_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_strings_cache_independently() {
        let (cache, backend) = memory_cache();
        let handler = |req: RouteRequest| async move { Reply::ok(json!({"query": req.query})) };
        let logs = cache.wrap("get_logs", DEFAULT_TTL, handler);

        let (page1, _) = logs
            .call(RouteRequest::get("/api/v1/logs", "page=1", Caller::Anonymous))
            .await;
        let (page2, _) = logs
            .call(RouteRequest::get("/api/v1/logs", "page=2", Caller::Anonymous))
            .await;
        assert_eq!(page1.payload, json!({"query": "page=1"}));
        assert_eq!(page2.payload, json!({"query": "page=2"}));
        assert_eq!(backend.db_size().await.unwrap(), 2);

        let (again, outcome) = logs
            .call(RouteRequest::get("/api/v1/logs", "page=2", Caller::Anonymous))
            .await;
        assert_eq!(outcome, CacheOutcome::Hit);
        assert_eq!(again.payload, json!({"query": "page=2"}));
    }

    #[tokio::test]
    async fn test_backend_down_returns_fresh_result() {
        let cache = ResponseCache::new(CacheStore::new(Arc::new(DisabledBackend)), DEFAULT_TTL);
        let calls = Arc::new(AtomicUsize::new(0));
        let files = cache.wrap(
            "list_files",
            DEFAULT_TTL,
            counting_handler(calls.clone(), Reply::ok(json!({"files": []}))),
        );
        let request = RouteRequest::get("/api/v1/files", "", Caller::Anonymous);

        for _ in 0..2 {
            let (reply, outcome) = files.call(request.clone()).await;
            assert_eq!(outcome, CacheOutcome::Miss);
            assert_eq!(reply, Reply::ok(json!({"files": []})));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invoke_with_closure() {
        let (cache, _) = memory_cache();
        let request = RouteRequest::get("/api/v1/dashboard/stats", "", Caller::Anonymous);

        let (reply, outcome): (Reply, _) = cache
            .invoke("dashboard_stats", &request, DEFAULT_TTL, || async {
                Reply::ok(json!({"sensors": 4}))
            })
            .await;
        assert_eq!(outcome, CacheOutcome::Miss);
        assert_eq!(reply.payload["sensors"], 4);

        let ran = AtomicUsize::new(0);
        let (reply, outcome): (Reply, _) = cache
            .invoke("dashboard_stats", &request, DEFAULT_TTL, || async {
                ran.fetch_add(1, Ordering::SeqCst);
                Reply::ok(json!({"sensors": 0}))
            })
            .await;
        assert_eq!(outcome, CacheOutcome::Hit);
        assert_eq!(reply.payload["sensors"], 4);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
