//! Outbound requests to the upstream origin.

use axum::body::{Body, Bytes};
use axum::http::{uri::InvalidUri, HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::upstream::headers::outbound_headers;

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Why an upstream exchange produced no response.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream target {target}: {source}")]
    InvalidTarget {
        target: String,
        source: InvalidUri,
    },
    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read upstream body: {0}")]
    Body(#[source] axum::Error),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

/// Forwards requests to a single upstream base URL.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    base: String,
    timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(config.connect_timeout());
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            base: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Upstream URL for a request path and optional query.
    pub fn target(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base, path, q),
            _ => format!("{}{}", self.base, path),
        }
    }

    /// Send the request upstream and buffer the whole response.
    ///
    /// The request body is always empty. No retries are attempted.
    pub async fn forward(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<UpstreamResponse, ForwardError> {
        let target = self.target(path, query);
        let uri: Uri = target
            .parse()
            .map_err(|source| ForwardError::InvalidTarget {
                target: target.clone(),
                source,
            })?;

        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(Body::empty())?;
        *request.headers_mut() = outbound_headers(headers);

        tracing::debug!(method = %method, target = %target, "Forwarding upstream");

        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(ForwardError::Body)?;
            Ok::<_, ForwardError>(UpstreamResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ForwardError::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(base: &str) -> Forwarder {
        Forwarder::new(&UpstreamConfig {
            base_url: base.to_string(),
            ..UpstreamConfig::default()
        })
    }

    #[test]
    fn target_appends_path_and_query_verbatim() {
        let f = forwarder("http://origin:9000");
        assert_eq!(f.target("/data", None), "http://origin:9000/data");
        assert_eq!(f.target("/data", Some("")), "http://origin:9000/data");
        assert_eq!(f.target("/data", Some("x=1&y=%20")), "http://origin:9000/data?x=1&y=%20");
    }

    #[test]
    fn target_keeps_base_path_without_doubling_slashes() {
        let f = forwarder("http://origin:9000/api/");
        assert_eq!(f.target("/v1/series", None), "http://origin:9000/api/v1/series");
    }

    #[tokio::test]
    async fn refused_connection_is_request_error() {
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let f = forwarder(&format!("http://{addr}"));
        let err = f
            .forward(&Method::GET, "/x", None, &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Request(_)), "got {err:?}");
    }
}
