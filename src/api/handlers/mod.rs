//! API request handlers.

pub mod admin;
pub mod anthropic;
pub mod openai;

use crate::core::{resolve_pool, ForwardReply};
use crate::types::{GatewayError, Result};
use crate::AppState;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

/// Shared entry for both gateway routes: validate, resolve the pool, and
/// forward. Streaming is forced on for every forwarded request so the
/// gateway keeps a liveness signal and can heartbeat the client.
pub(crate) async fn forward_entry(state: AppState, body: Value) -> Result<Response> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if model.is_empty() {
        return Err(GatewayError::InvalidInput("missing 'model' field".into()));
    }

    let pool = resolve_pool(&model, &state.settings);
    tracing::info!(model = %model, pool = %pool, "incoming gateway request");

    match state.forwarder.forward(pool, body, true).await? {
        ForwardReply::Stream(stream) => Ok((
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(stream),
        )
            .into_response()),
        ForwardReply::Json(value) => Ok(Json(value).into_response()),
    }
}
