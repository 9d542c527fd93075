//! Anthropic-compatible gateway route (`/v1/messages`).

use crate::types::Result;
use crate::AppState;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde_json::Value;

/// Anthropic Messages entry point. Consumed identically to the OpenAI
/// route: the requested model name picks the pool, the body passes through.
#[utoipa::path(
    post,
    path = "/v1/messages",
    responses(
        (status = 200, description = "Upstream response (SSE)"),
        (status = 400, description = "Missing model field"),
        (status = 502, description = "No endpoint available / all retries exhausted")
    ),
    tag = "gateway"
)]
pub async fn messages(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response> {
    super::forward_entry(state, body).await
}
