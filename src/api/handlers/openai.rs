//! OpenAI-compatible gateway routes (`/v1/chat/completions`, `/v1/models`).

use crate::types::Result;
use crate::AppState;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};

/// OpenAI Chat Completions entry point.
///
/// The body is an OpenAI-shape request; the requested model name picks the
/// pool, and the body is forwarded untouched apart from the `model` field.
#[utoipa::path(
    post,
    path = "/v1/chat/completions",
    responses(
        (status = 200, description = "Upstream response (SSE)"),
        (status = 400, description = "Missing model field"),
        (status = 502, description = "No endpoint available / all retries exhausted")
    ),
    tag = "gateway"
)]
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response> {
    super::forward_entry(state, body).await
}

/// The three virtual models, in the OpenAI list shape.
#[utoipa::path(
    get,
    path = "/v1/models",
    responses((status = 200, description = "Virtual model list")),
    tag = "gateway"
)]
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let entry = |id: &str, description: &str| {
        json!({
            "id": id,
            "object": "model",
            "created": 0,
            "owned_by": "api-pool-gateway",
            "description": description,
        })
    };

    Json(json!({
        "object": "list",
        "data": [
            entry(&state.settings.virtual_model_tool, "Tool pool"),
            entry(&state.settings.virtual_model_normal, "Normal pool"),
            entry(&state.settings.virtual_model_advanced, "Advanced pool"),
        ],
    }))
}
