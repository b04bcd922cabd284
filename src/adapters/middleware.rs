//! Axum middleware attached to the city API router.
//!
//! Small stateless layers for cross-cutting concerns: request timing and
//! metrics, security headers, and per-request ids.
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::{
    metrics::{self, RequestTimer},
    tracing_setup::create_request_span,
};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Log completion of a request including latency, and record request metrics.
///
/// Metrics are labelled with the matched route template (`/city/{name}`), not
/// the raw path, to keep label cardinality bounded.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let _timer = RequestTimer::new(&route, method.as_str());
    let response = next.run(req).await;

    metrics::increment_request_total(&route, method.as_str(), response.status().as_u16());
    tracing::info!(
        "Completed {} {} - {} in {:?}",
        method,
        uri,
        response.status(),
        start.elapsed()
    );

    response
}

/// Add common security hardening headers.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

/// Generate a per-request UUID, attach it to a tracing span around the rest
/// of the stack, and expose it via `X-Request-ID`.
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    let span = create_request_span(req.method().as_str(), req.uri().path(), &request_id);

    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
