use std::sync::Arc;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    api::tavus::{PersonaRequest, TavusError},
    utils::persona_prompts::{STYLIST_CONTEXT_PROMPT, STYLIST_PERSONA_NAME, STYLIST_SYSTEM_PROMPT},
    AppState,
};

/// Dev-only utility: registers the stylist persona with Tavus.
///
/// Takes no body. Answers `{success, persona, message}` on success and
/// `{error, details, status}` when Tavus refuses the request.
pub async fn setup_persona(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(tavus) = state.tavus.as_ref() else {
        error!("TAVUS_API_KEY is not set");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": TavusError::NotConfigured.to_string() })),
        ));
    };

    info!("Creating stylist persona {}", state.config.persona_id);
    let request = PersonaRequest {
        persona_name: STYLIST_PERSONA_NAME.to_string(),
        system_prompt: STYLIST_SYSTEM_PROMPT.to_string(),
        context_prompt: STYLIST_CONTEXT_PROMPT.to_string(),
        persona_id: state.config.persona_id.clone(),
    };

    match tavus.create_persona(&request).await {
        Ok(persona) => {
            info!("Persona created successfully: {}", persona);
            Ok(Json(json!({
                "success": true,
                "persona": persona,
                "message": "Adrian persona created successfully",
            })))
        }
        Err(TavusError::Upstream { status, body }) => Err((
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(json!({
                "error": "Failed to create persona",
                "details": body,
                "status": status,
            })),
        )),
        Err(e) => {
            error!("Error in persona setup: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "details": e.to_string(),
                })),
            ))
        }
    }
}
