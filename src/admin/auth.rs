//! Bearer API key gate for the admin API.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestIdExt;
use crate::http::response::error_response;
use crate::http::server::AppState;

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| keys_match(token, &state.config.admin.api_key));

    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(
        request_id = request.headers().request_id().unwrap_or("unknown"),
        path = %request.uri().path(),
        "Rejected admin request without valid API key"
    );
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid API key")
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
