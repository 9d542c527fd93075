//! Admin surface: CRUD for providers, endpoints and pools, plus live pool
//! status, request logs and cooldown management.
//!
//! Everything here reads and writes the same store the data plane uses;
//! cooldown state comes from the in-memory tracker only.

use crate::core::pool::PoolStatus;
use crate::types::{
    Endpoint, EndpointCreate, EndpointUpdate, GatewayError, Pool, PoolKind, PoolUpdate, Provider,
    ProviderCreate, ProviderUpdate, RequestLog, Result,
};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A provider together with its endpoints, as listed by the admin UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderWithEndpoints {
    #[serde(flatten)]
    pub provider: Provider,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogList {
    pub total: i64,
    pub logs: Vec<RequestLog>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_pool(s: &str) -> Result<PoolKind> {
    PoolKind::from_db(s)
        .ok_or_else(|| GatewayError::InvalidInput(format!("unknown pool '{}'", s)))
}

// ============= Providers =============

#[utoipa::path(
    get,
    path = "/admin/providers",
    responses((status = 200, description = "All providers with their endpoints", body = [ProviderWithEndpoints])),
    tag = "admin"
)]
pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderWithEndpoints>>> {
    let providers = state.store.list_providers().await?;
    let mut out = Vec::with_capacity(providers.len());
    for provider in providers {
        let endpoints = state.store.list_provider_endpoints(provider.id).await?;
        out.push(ProviderWithEndpoints {
            provider,
            endpoints,
        });
    }
    Ok(Json(out))
}

#[utoipa::path(
    post,
    path = "/admin/providers",
    request_body = ProviderCreate,
    responses((status = 200, description = "Created provider", body = Provider)),
    tag = "admin"
)]
pub async fn create_provider(
    State(state): State<AppState>,
    Json(create): Json<ProviderCreate>,
) -> Result<Json<Provider>> {
    if create.name.trim().is_empty() || create.base_url.trim().is_empty() {
        return Err(GatewayError::InvalidInput(
            "provider name and base_url are required".into(),
        ));
    }
    Ok(Json(state.store.create_provider(create).await?))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ProviderUpdate>,
) -> Result<Json<Provider>> {
    Ok(Json(state.store.update_provider(id, update).await?))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>> {
    state.store.delete_provider(id).await?;
    Ok(Json(Message {
        message: format!("provider {} deleted", id),
    }))
}

// ============= Endpoints =============

pub async fn create_endpoint(
    State(state): State<AppState>,
    Json(create): Json<EndpointCreate>,
) -> Result<Json<Endpoint>> {
    Ok(Json(state.store.create_endpoint(create).await?))
}

pub async fn create_endpoints_batch(
    State(state): State<AppState>,
    Json(creates): Json<Vec<EndpointCreate>>,
) -> Result<Json<Vec<Endpoint>>> {
    Ok(Json(state.store.create_endpoints(creates).await?))
}

pub async fn update_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<EndpointUpdate>,
) -> Result<Json<Endpoint>> {
    Ok(Json(state.store.update_endpoint(id, update).await?))
}

pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>> {
    state.store.delete_endpoint(id).await?;
    // A deleted endpoint should not linger in the cooldown map.
    state.pool_manager.cooldown_tracker().clear(id);
    Ok(Json(Message {
        message: format!("endpoint {} deleted", id),
    }))
}

// ============= Pools =============

pub async fn list_pools(State(state): State<AppState>) -> Result<Json<Vec<Pool>>> {
    Ok(Json(state.store.list_pools().await?))
}

pub async fn update_pool(
    State(state): State<AppState>,
    Path(pool): Path<String>,
    Json(update): Json<PoolUpdate>,
) -> Result<Json<Pool>> {
    let pool = parse_pool(&pool)?;
    Ok(Json(state.store.update_pool(pool, update).await?))
}

#[utoipa::path(
    get,
    path = "/admin/pools/{pool}/status",
    params(("pool" = String, Path, description = "tool | normal | advanced")),
    responses((status = 200, description = "Live pool status", body = PoolStatus)),
    tag = "admin"
)]
pub async fn pool_status(
    State(state): State<AppState>,
    Path(pool): Path<String>,
) -> Result<Json<PoolStatus>> {
    let pool = parse_pool(&pool)?;
    Ok(Json(state.pool_manager.pool_status(pool).await?))
}

// ============= Request Logs =============

#[utoipa::path(
    get,
    path = "/admin/logs",
    responses((status = 200, description = "Request logs, newest first", body = LogList)),
    tag = "admin"
)]
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogList>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);
    let (logs, total) = state.store.list_request_logs(limit, offset).await?;
    Ok(Json(LogList { total, logs }))
}

pub async fn delete_logs(State(state): State<AppState>) -> Result<Json<Message>> {
    let deleted = state.store.delete_request_logs().await?;
    Ok(Json(Message {
        message: format!("{} request logs deleted", deleted),
    }))
}

// ============= Cooldowns =============

pub async fn clear_cooldowns(State(state): State<AppState>) -> Json<Message> {
    state.pool_manager.cooldown_tracker().clear_all();
    Json(Message {
        message: "all cooldowns cleared".into(),
    })
}

pub async fn clear_cooldown(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Json<Message> {
    state.pool_manager.cooldown_tracker().clear(id);
    Json(Message {
        message: format!("cooldown cleared for endpoint {}", id),
    })
}
