//! Client response construction.
//!
//! # Responsibilities
//! - Serve cached bodies
//! - Relay upstream responses with framing headers recomputed
//! - Add `Access-Control-Allow-Origin: *`
//! - Render the fixed error page
//!
//! # Design Decisions
//! - Bodies are fully buffered, so hyper derives `Content-Length` itself
//! - Clients never see which upstream failure happened

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::upstream::{headers::relayed_headers, UpstreamResponse};

/// Body served whenever a request cannot be answered.
pub const INTERNAL_ERROR_HTML: &str = "<!DOCTYPE html>\n<html><head><title>500 Internal Server Error</title></head>\
<body><h1>Internal Server Error</h1></body></html>\n";

/// A cache hit: status 200 and the stored bytes, nothing else preserved.
pub fn cached(body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    allow_any_origin(&mut response);
    response
}

/// An upstream response relayed to the client.
pub fn relayed(upstream: UpstreamResponse) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = relayed_headers(&upstream.headers);
    allow_any_origin(&mut response);
    response
}

pub fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        INTERNAL_ERROR_HTML,
    )
        .into_response()
}

fn allow_any_origin(response: &mut Response) {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn relayed_overrides_upstream_cors_and_drops_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("999"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://only.example"),
        );
        headers.insert("x-origin", HeaderValue::from_static("yes"));

        let response = relayed(UpstreamResponse {
            status: StatusCode::NOT_FOUND,
            headers,
            body: Bytes::from_static(b"not found"),
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()["x-origin"], "yes");
    }

    #[test]
    fn cached_is_plain_ok() {
        let response = cached(Bytes::from_static(b"body"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn internal_error_is_html_500() {
        let response = internal_error();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }
}
