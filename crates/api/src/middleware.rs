use std::time::Instant;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::context::RequesterContext;

pub const REQUESTED_BY_HEADER: &str = "x-requested-by";

/// Require an `x-requested-by` header and expose it as [`RequesterContext`].
pub async fn requester_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let requested_by = extract_requester(req.headers())?.to_string();
    req.extensions_mut().insert(RequesterContext::new(requested_by));
    Ok(next.run(req).await)
}

fn extract_requester(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers.get(REQUESTED_BY_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
    let value = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(value)
}

/// Log method, path, status and latency of every request.
pub async fn request_log(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        %method,
        path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}
