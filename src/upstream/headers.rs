//! Header hygiene between client, proxy and upstream.
//!
//! # Responsibilities
//! - Strip hop-by-hop and transport-managed headers in both directions
//! - Drop `Content-Length` so framing is recomputed for the buffered body
//! - Honour headers listed in `Connection` as hop-by-hop

use axum::http::header::{self, HeaderMap, HeaderName};

/// Headers owned by the transport of a single hop.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "expect",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Headers to send upstream for a given inbound request.
///
/// `Host` is left to the HTTP client, which derives it from the target URI.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    filtered(inbound, |name| *name == header::HOST || *name == header::CONTENT_LENGTH)
}

/// Headers to relay to the client from an upstream response.
pub fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    filtered(upstream, |name| *name == header::CONTENT_LENGTH)
}

fn filtered(source: &HeaderMap, also_drop: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let listed = connection_tokens(source);
    let mut out = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) || also_drop(name) || listed.iter().any(|t| t == name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Header names nominated as hop-by-hop by the `Connection` header.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.append(*k, HeaderValue::from_static(v));
        }
        headers
    }

    #[test]
    fn outbound_drops_framing_and_hop_by_hop() {
        let inbound = map(&[
            ("host", "proxy.local:8080"),
            ("content-length", "0"),
            ("connection", "keep-alive, x-private"),
            ("x-private", "secret"),
            ("accept", "application/json"),
            ("x-trace", "abc"),
        ]);

        let out = outbound_headers(&inbound);

        assert!(out.get("host").is_none());
        assert!(out.get("content-length").is_none());
        assert!(out.get("connection").is_none());
        assert!(out.get("x-private").is_none());
        assert_eq!(out.get("accept").unwrap(), "application/json");
        assert_eq!(out.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn relayed_keeps_repeated_headers() {
        let upstream = map(&[
            ("content-length", "12"),
            ("transfer-encoding", "chunked"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
            ("content-type", "text/csv"),
        ]);

        let out = relayed_headers(&upstream);

        assert!(out.get("content-length").is_none());
        assert!(out.get("transfer-encoding").is_none());
        assert_eq!(out.get_all("set-cookie").iter().count(), 2);
        assert_eq!(out.get("content-type").unwrap(), "text/csv");
    }
}
