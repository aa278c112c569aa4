use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// Bearer-token guard for every `/api` route.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if token_matches(bearer_token(&headers), &state.dashboard_token) {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Rejected dashboard request without valid token");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "unauthorized"})),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// An empty configured token never authorizes anything.
pub(crate) fn token_matches(presented: Option<&str>, expected: &str) -> bool {
    matches!(presented, Some(t) if !expected.is_empty() && t == expected)
}
