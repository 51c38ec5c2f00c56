use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use crate::AppState;
use serde_json::json;
use tracing::{debug, error};

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim());
        }
    }
    headers.get("apikey").and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Gates the API routes behind the publishable client key.
///
/// When `CLIENT_API_KEY` is unset the gate is open, which is how local
/// development runs.
pub async fn require_client_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let Some(expected) = state.config.client_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    match presented_key(&headers) {
        Some(key) if key == expected => {
            debug!("Client key accepted for {}", request.uri().path());
            Ok(next.run(request).await)
        }
        Some(_) => {
            error!("Invalid client key for {}", request.uri().path());
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid client key" })),
            ))
        }
        None => {
            error!("No client key presented for {}", request.uri().path());
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Missing client key" })),
            ))
        }
    }
}
