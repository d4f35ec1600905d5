//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create the Axum Router with the proxy handler
//! - Wire up middleware (tracing, request ID, panic guard)
//! - Bind every listen prefix and run one accept loop per socket
//! - Serve each connection on its own task (HTTP/1.1 only)
//! - Stop: close listeners, then drain in-flight connections

use axum::{
    body::Body,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    server::graceful::GracefulShutdown,
};
use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::Service;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::http::handler::{proxy_handler, AppState};
use crate::http::request::{request_id_header, UuidRequestId};
use crate::http::response;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, ListenPrefix, Listener, ListenerError};
use crate::observability::metrics;
use crate::upstream::Forwarder;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Errors that prevent the proxy from starting.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("Failed to open cache root {path}: {source}")]
    CacheRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A configured, not yet running, caching proxy.
pub struct CacheProxy {
    config: ProxyConfig,
}

impl CacheProxy {
    /// Create a proxy from an already validated configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);
        with_middleware(router)
    }

    /// Open the cache, bind every prefix and start accepting.
    ///
    /// Nothing is spawned unless every prefix binds.
    pub async fn start(self) -> Result<RunningProxy, ProxyError> {
        let store = CacheStore::open(&self.config.cache.root)
            .await
            .map_err(|source| ProxyError::CacheRoot {
                path: self.config.cache.root.clone(),
                source,
            })?;

        let state = AppState {
            store: Arc::new(store),
            forwarder: Forwarder::new(&self.config.upstream),
            store_error_responses: self.config.cache.store_error_responses,
        };
        let app = Self::build_router(state);

        let mut listeners = Vec::with_capacity(self.config.listener.prefixes.len());
        for raw in &self.config.listener.prefixes {
            let prefix = ListenPrefix::parse(raw).map_err(ListenerError::from)?;
            listeners.push(Listener::bind(&prefix, self.config.listener.max_connections).await?);
        }

        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let mut local_addrs = Vec::with_capacity(listeners.len());
        let mut accept_loops = Vec::with_capacity(listeners.len());

        for listener in listeners {
            local_addrs.push(listener.local_addr());
            accept_loops.push(tokio::spawn(accept_loop(
                listener,
                app.clone(),
                tracker.clone(),
                shutdown.subscribe(),
            )));
        }

        tracing::info!(
            addresses = ?local_addrs,
            upstream = %self.config.upstream.base_url,
            cache_root = %self.config.cache.root.display(),
            "Caching proxy started"
        );

        Ok(RunningProxy {
            local_addrs,
            shutdown,
            tracker,
            accept_loops,
            drain_timeout: self.config.listener.drain_timeout(),
        })
    }
}

/// Handle to a running proxy.
///
/// Dropping the handle also stops the accept loops, without draining.
pub struct RunningProxy {
    local_addrs: Vec<SocketAddr>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_loops: Vec<JoinHandle<()>>,
    drain_timeout: Duration,
}

impl RunningProxy {
    /// Addresses actually bound, in prefix order.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Close every listening socket, then wait up to the drain timeout for
    /// in-flight connections. Connections still open afterwards keep running.
    pub async fn stop(self) {
        let notified = self.shutdown.trigger();
        tracing::info!(accept_loops = notified, "Stopping caching proxy");

        for task in self.accept_loops {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Accept loop ended abnormally");
            }
        }

        if self.tracker.wait_idle(self.drain_timeout).await {
            tracing::info!("Caching proxy stopped");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                timeout = ?self.drain_timeout,
                "Drain timeout elapsed, leaving connections to finish on their own"
            );
        }
    }
}

fn with_middleware(router: Router) -> Router {
    let request_id = request_id_header();
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, UuidRequestId))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");
    metrics::record_panic();
    response::internal_error()
}

async fn accept_loop(
    listener: Listener,
    app: Router,
    tracker: ConnectionTracker,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new());
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer_addr, permit) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed, continuing");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let guard = tracker.track();
                let app = app.clone();
                let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                    app.clone().call(request)
                });
                let builder = builder.clone();
                let watcher = graceful.watcher();

                tokio::spawn(async move {
                    let conn = builder.serve_connection(TokioIo::new(stream), service);
                    if let Err(e) = watcher.watch(conn).await {
                        tracing::debug!(
                            connection_id = %guard.id(),
                            peer_addr = %peer_addr,
                            error = %e,
                            "Connection closed with error"
                        );
                    }
                    drop(permit);
                    drop(guard);
                });
            }
        }
    }

    tracing::info!(address = %listener.local_addr(), "Listener closed");
    drop(listener);

    // Ask open connections to finish their current request and close.
    tokio::spawn(graceful.shutdown());
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn panicking_handler_still_answers_with_error_page() {
        async fn explode() -> &'static str {
            panic!("handler exploded")
        }
        let router = with_middleware(Router::new().route("/boom", any(explode)));

        let response = router
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, response::INTERNAL_ERROR_HTML.as_bytes());
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let router = with_middleware(Router::new().route("/", any(|| async { "ok" })));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "client-chosen")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "client-chosen");
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
