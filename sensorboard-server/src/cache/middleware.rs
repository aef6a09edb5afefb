//! axum adapter for the response cache
//!
//! ```ignore
//! .route(
//!     "/files",
//!     get(handlers::list_files)
//!         .layer(middleware::from_fn(cached_route(cache.clone(), "list_files", ttl))),
//! )
//! ```

use super::key::Caller;
use super::wrapper::{CacheOutcome, Cacheable, ResponseCache, RouteRequest};
use crate::auth::AuthContext;
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderValue, StatusCode, header, response::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::warn;

/// Response header reporting what the cache did
pub const X_CACHE: &str = "x-cache";

type BoxResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Build a middleware function caching the wrapped route under `operation`.
///
/// Use with `axum::middleware::from_fn`. The caller identity comes from the
/// [`AuthContext`] inserted by the auth middleware; requests without one are
/// keyed as anonymous.
pub fn cached_route(
    cache: ResponseCache,
    operation: &'static str,
    ttl: Duration,
) -> impl Fn(Request, Next) -> BoxResponseFuture + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| {
        let cache = cache.clone();
        Box::pin(async move {
            let route = route_request(&req);
            let (buffered, outcome) = cache
                .invoke(operation, &route, ttl, || async move {
                    BufferedResponse::collect(next.run(req).await).await
                })
                .await;

            let mut response = buffered.into_response();
            response
                .headers_mut()
                .insert(X_CACHE, HeaderValue::from_static(outcome.as_str()));
            response
        }) as BoxResponseFuture
    }
}

fn route_request(req: &Request) -> RouteRequest {
    let caller = Caller::from(req.extensions().get::<AuthContext>());
    RouteRequest::new(
        req.method().clone(),
        req.uri().path(),
        req.uri().query().unwrap_or_default(),
        caller,
    )
}

/// A response whose body has been read into memory
pub struct BufferedResponse {
    parts: Parts,
    body: Bytes,
    json: Option<Value>,
}

impl BufferedResponse {
    async fn collect(response: Response) -> Self {
        let (parts, body) = response.into_parts();

        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to buffer response body: {}", e);
                let (parts, _) = StatusCode::INTERNAL_SERVER_ERROR.into_response().into_parts();
                return Self {
                    parts,
                    body: Bytes::new(),
                    json: None,
                };
            }
        };

        let json = if is_json(&parts) {
            serde_json::from_slice(&body).ok()
        } else {
            None
        };

        Self { parts, body, json }
    }
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

impl Cacheable for BufferedResponse {
    fn status(&self) -> StatusCode {
        self.parts.status
    }

    fn payload(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    fn from_cached(payload: Value) -> Self {
        let body = Bytes::from(serde_json::to_vec(&payload).unwrap_or_default());
        let (mut parts, _) = Response::new(()).into_parts();
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Self {
            parts,
            body,
            json: Some(payload),
        }
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        Response::from_parts(self.parts, Body::from(self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use serde_json::json;

    #[tokio::test]
    async fn test_collect_json_response() {
        let response = (StatusCode::OK, Json(json!({"files": []}))).into_response();
        let buffered = BufferedResponse::collect(response).await;

        assert_eq!(buffered.status(), StatusCode::OK);
        assert_eq!(buffered.payload(), Some(&json!({"files": []})));
    }

    #[tokio::test]
    async fn test_collect_plain_text_has_no_payload() {
        let response = (StatusCode::OK, "hello").into_response();
        let buffered = BufferedResponse::collect(response).await;

        assert_eq!(buffered.payload(), None);
        let response = buffered.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_from_cached_is_json_200() {
        let response = BufferedResponse::from_cached(json!({"total": 3})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"total": 3}));
    }
}
