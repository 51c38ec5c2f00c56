use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    Json,
    body::Bytes,
    extract::{connect_info::ConnectInfo, State},
    http::{Extensions, HeaderMap, StatusCode},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::{
    api::tavus::{ConversationRequest, TavusError},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationBody {
    #[serde(default, alias = "personaId")]
    pub persona_id: Option<String>,
    #[serde(default, alias = "replicaId")]
    pub replica_id: Option<String>,
}

// The peer address identifies the client unless a proxy we trust sits in
// front, in which case its first x-forwarded-for hop does.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => {
            warn!("Unable to determine client IP, using the shared bucket");
            "unknown".to_string()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Creates a Tavus conversation for the landing page call widget and
/// returns only its join URL. Upstream details stay in the logs.
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(tavus) = state.tavus.as_ref() else {
        error!("TAVUS_API_KEY is not set");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": TavusError::NotConfigured.to_string() })),
        ));
    };

    let requested: CreateConversationBody = if body.iter().all(u8::is_ascii_whitespace) {
        CreateConversationBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            debug!("Rejecting malformed conversation request: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request body" })),
            )
        })?
    };

    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let limiter_key = client_key(&headers, peer, state.config.trust_forwarded_for);
    if state.conversation_limiter.check_key(&limiter_key).is_err() {
        warn!("Conversation rate limit exceeded for {}", limiter_key);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many consultation requests, try again later" })),
        ));
    }

    let persona_id = non_empty(requested.persona_id)
        .unwrap_or_else(|| state.config.persona_id.clone());
    let request = ConversationRequest {
        persona_id,
        // Left out when unset; Tavus then uses the persona's default replica.
        replica_id: non_empty(requested.replica_id).or_else(|| state.config.replica_id.clone()),
    };

    match tavus.create_conversation(&request).await {
        Ok(conversation) => {
            info!(
                "Conversation created for persona {}: {:?}",
                request.persona_id, conversation.conversation_id
            );
            Ok(Json(json!({ "conversation_url": conversation.conversation_url })))
        }
        Err(TavusError::Upstream { status, body }) => {
            error!("Tavus refused conversation ({}): {}", status, body);
            Err((
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                Json(json!({
                    "error": "Failed to create conversation",
                    "status": status,
                })),
            ))
        }
        Err(e) => {
            error!("Error creating conversation: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Failed to create conversation",
                    "status": StatusCode::BAD_GATEWAY.as_u16(),
                })),
            ))
        }
    }
}
