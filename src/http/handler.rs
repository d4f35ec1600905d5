//! Per-request cache/forward decision.
//!
//! ```text
//! CacheLookup --hit--> ServeFromCache
//! CacheLookup --miss--> Forward --ok--> StoreAndServe
//!                               --err-> ServeError (500)
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheKey, CacheStore};
use crate::http::request::request_id;
use crate::http::response;
use crate::observability::metrics::{self, Outcome};
use crate::upstream::Forwarder;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CacheStore>,
    pub forwarder: Forwarder,
    /// Persist non-2xx bodies too.
    pub store_error_responses: bool,
}

impl AppState {
    fn should_store(&self, status: StatusCode) -> bool {
        self.store_error_responses || status.is_success()
    }
}

/// Serve from cache, or forward upstream and cache the body.
///
/// The key only depends on the path: query string, method and headers are
/// ignored for lookup but still forwarded on a miss.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _body) = request.into_parts();
    let path = parts.uri.path();
    let request_id = request_id(&parts.headers);
    let key = CacheKey::from_path(path);

    if let Some(body) = state.store.get(&key).await {
        tracing::debug!(
            request_id = %request_id,
            path = %path,
            key = %key,
            bytes = body.len(),
            "Cache hit"
        );
        metrics::record_request(Outcome::Hit, start);
        return response::cached(body);
    }

    let upstream = match state
        .forwarder
        .forward(&parts.method, path, parts.uri.query(), &parts.headers)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                method = %parts.method,
                path = %path,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(Outcome::Error, start);
            return response::internal_error();
        }
    };

    metrics::record_upstream_fetch(upstream.status.as_u16());
    tracing::info!(
        request_id = %request_id,
        path = %path,
        status = upstream.status.as_u16(),
        bytes = upstream.body.len(),
        "Fetched from upstream"
    );

    if state.should_store(upstream.status) {
        if let Err(e) = state.store.put(&key, &upstream.body).await {
            metrics::record_cache_write_failure();
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                key = %key,
                error = %e,
                "Cache write failed"
            );
        }
    } else {
        tracing::debug!(request_id = %request_id, path = %path, status = upstream.status.as_u16(), "Not caching error response");
    }

    metrics::record_request(Outcome::Miss, start);
    response::relayed(upstream)
}
