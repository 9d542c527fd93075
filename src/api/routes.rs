use crate::api::handlers;
use crate::AppState;
use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};

/// Assemble the full route tree: the gateway surface under `/v1`, the admin
/// surface under `/admin`, and the health probe.
pub fn router() -> Router<AppState> {
    let gateway = Router::new()
        .route(
            "/chat/completions",
            post(handlers::openai::chat_completions),
        )
        .route("/messages", post(handlers::anthropic::messages))
        .route("/models", get(handlers::openai::list_models));

    let admin = Router::new()
        .route(
            "/providers",
            get(handlers::admin::list_providers).post(handlers::admin::create_provider),
        )
        .route(
            "/providers/{id}",
            put(handlers::admin::update_provider).delete(handlers::admin::delete_provider),
        )
        .route("/endpoints", post(handlers::admin::create_endpoint))
        .route(
            "/endpoints/batch",
            post(handlers::admin::create_endpoints_batch),
        )
        .route(
            "/endpoints/{id}",
            put(handlers::admin::update_endpoint).delete(handlers::admin::delete_endpoint),
        )
        .route("/pools", get(handlers::admin::list_pools))
        .route("/pools/{pool}", put(handlers::admin::update_pool))
        .route("/pools/{pool}/status", get(handlers::admin::pool_status))
        .route(
            "/logs",
            get(handlers::admin::list_logs).delete(handlers::admin::delete_logs),
        )
        .route("/cooldowns", delete(handlers::admin::clear_cooldowns))
        .route("/cooldowns/{id}", delete(handlers::admin::clear_cooldown));

    Router::new()
        .route("/health", get(health))
        .nest("/v1", gateway)
        .nest("/admin", admin)
}

/// Health check endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "api-pool-gateway",
    }))
}
