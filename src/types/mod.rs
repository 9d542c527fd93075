//! Core types used throughout the gateway.
//!
//! This module contains the common data structures used for:
//! - The persisted data model (providers, endpoints, pools, request logs)
//! - Admin API requests and responses
//! - Error handling (both the HTTP-facing error type and the closed
//!   forwarding error taxonomy)

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= Enumerations =============

/// Wire format spoken by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// OpenAI-style `POST {base_url}/chat/completions`.
    OpenAI,
    /// Anthropic-style `POST {base_url}/messages`.
    Anthropic,
}

impl ApiFormat {
    /// Stable string form used in the database and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiFormat::OpenAI => "openai",
            ApiFormat::Anthropic => "anthropic",
        }
    }

    /// Parse the database string form. Unknown values default to OpenAI,
    /// matching the column default.
    pub fn from_db(s: &str) -> Self {
        match s {
            "anthropic" => ApiFormat::Anthropic,
            _ => ApiFormat::OpenAI,
        }
    }
}

impl std::fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical endpoint pool addressed by a virtual model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Lightweight tool-calling models.
    Tool,
    /// Default pool.
    Normal,
    /// High-capability models.
    Advanced,
}

impl PoolKind {
    /// All pools, in display order.
    pub const ALL: [PoolKind; 3] = [PoolKind::Tool, PoolKind::Normal, PoolKind::Advanced];

    /// Stable string form used in the database and in routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Tool => "tool",
            PoolKind::Normal => "normal",
            PoolKind::Advanced => "advanced",
        }
    }

    /// Parse the database/path string form.
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "tool" => Some(PoolKind::Tool),
            "normal" => Some(PoolKind::Normal),
            "advanced" => Some(PoolKind::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Persisted Records =============

/// An upstream account: base URL, credential and wire format.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Provider {
    /// Row id.
    pub id: i64,
    /// Human-readable name, shown in logs and stats.
    pub name: String,
    /// Base URL without a trailing slash, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Opaque upstream credential.
    pub api_key: String,
    /// Wire format this provider speaks.
    pub api_format: ApiFormat,
    /// Disabled providers are invisible to the scheduler.
    pub enabled: bool,
    /// Total requests dispatched to this provider's endpoints.
    pub total_requests: i64,
    pub success_requests: i64,
    pub error_requests: i64,
    /// Creation time, unix seconds.
    pub created_at: i64,
}

/// A (provider, concrete model id) pair assigned to at most one pool.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Endpoint {
    /// Row id.
    pub id: i64,
    pub provider_id: i64,
    /// Concrete upstream model identifier, e.g. `claude-haiku-4-5`.
    pub model_id: String,
    /// Pool assignment; `None` means unassigned and never scheduled.
    pub pool: Option<PoolKind>,
    pub enabled: bool,
    /// Smooth-weighted-round-robin weight. Values below 1 count as 1.
    pub weight: i64,
    /// Minimum wall-clock gap between successful dispatches, seconds.
    pub min_interval_seconds: i64,
    /// Unix seconds of the last successful dispatch.
    pub last_request_at: Option<i64>,
    pub total_requests: i64,
    pub success_requests: i64,
    pub error_requests: i64,
    /// Arithmetic mean latency over successful attempts only.
    pub avg_latency_ms: f64,
    /// Most recent failure message, if any.
    pub last_error: Option<String>,
    pub created_at: i64,
}

/// Per-pool configuration. Auto-materialized with defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pool {
    pub pool: PoolKind,
    /// Client-visible model name that maps to this pool.
    pub virtual_model_name: String,
    /// Default parking duration after a failure; 0 disables parking.
    pub cooldown_seconds: i64,
    /// Advisory retry count (the forwarder uses its own budget).
    pub max_retries: i64,
    /// Per-attempt upstream timeout, seconds.
    pub timeout_seconds: i64,
}

/// An endpoint joined with its (enabled) provider, as returned by
/// [`crate::db::Store::list_pool_endpoints`].
#[derive(Debug, Clone)]
pub struct PoolEndpoint {
    pub endpoint: Endpoint,
    pub provider_name: String,
    pub base_url: String,
    pub api_key: String,
    pub api_format: ApiFormat,
}

/// A request-log record before insertion (no id / timestamp yet).
#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub pool: PoolKind,
    pub requested_model: String,
    pub actual_model: String,
    pub provider_name: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub latency_ms: i64,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

/// One request-log row, appended per terminal per-endpoint outcome.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestLog {
    pub id: i64,
    pub pool: PoolKind,
    /// Virtual model the client asked for.
    pub requested_model: String,
    /// Concrete upstream model that served (or failed) the attempt.
    pub actual_model: String,
    pub provider_name: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub latency_ms: i64,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    /// Unix seconds.
    pub created_at: i64,
}

// ============= Admin API Types =============

/// Payload for creating a provider.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProviderCreate {
    pub name: String,
    /// Trailing slashes are stripped before storing.
    pub base_url: String,
    pub api_key: String,
    pub api_format: ApiFormat,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Partial update for a provider. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_format: Option<ApiFormat>,
    pub enabled: Option<bool>,
}

/// Payload for creating an endpoint under a provider.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EndpointCreate {
    pub provider_id: i64,
    pub model_id: String,
    pub pool: Option<PoolKind>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default)]
    pub min_interval_seconds: i64,
}

/// Partial update for an endpoint. Absent fields are left unchanged.
///
/// `pool` uses a double `Option`: absent keeps the current assignment,
/// explicit `null` clears it.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EndpointUpdate {
    #[serde(default, with = "double_option")]
    pub pool: Option<Option<PoolKind>>,
    pub enabled: Option<bool>,
    pub weight: Option<i64>,
    pub min_interval_seconds: Option<i64>,
}

/// Partial update for a pool's scheduling knobs.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PoolUpdate {
    pub virtual_model_name: Option<String>,
    pub cooldown_seconds: Option<i64>,
    pub max_retries: Option<i64>,
    pub timeout_seconds: Option<i64>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> i64 {
    1
}

/// Serde helper distinguishing an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

// ============= Error Types =============

/// Closed taxonomy for one forwarding attempt's failure, pattern-matched by
/// the retry loop instead of downcasting client-library errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ForwardError {
    /// The pool is empty, or every endpoint is parked or inside its
    /// min-interval window.
    #[error("no endpoint available in pool '{0}'")]
    NoEndpoint(PoolKind),

    /// Connect/read/write failure, pool timeout or other transport fault.
    /// Retried on the same endpoint, then failed over.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered 429/500/502/503/504. Retried, then failed over.
    #[error("HTTP {status}: {body}")]
    UpstreamRetryable { status: u16, body: String },

    /// Upstream answered another 4xx. Never retried; surfaced verbatim.
    #[error("HTTP {status}: {body}")]
    UpstreamTerminal { status: u16, body: String },

    /// Failure after at least one body byte was forwarded downstream.
    #[error("stream interrupted: {0}")]
    StreamMidFlight(String),

    /// Anything else. Fails over to the next endpoint without inner retries.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ForwardError {
    /// Machine-readable kind for the downstream error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::NoEndpoint(_) => "no_endpoint_available",
            ForwardError::Transport(_) => "transport_error",
            ForwardError::UpstreamRetryable { .. } => "upstream_retryable",
            ForwardError::UpstreamTerminal { .. } => "upstream_terminal",
            ForwardError::StreamMidFlight(_) => "upstream_error",
            ForwardError::Unexpected(_) => "unexpected_error",
        }
    }

    /// Whether the same endpoint may be retried after backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForwardError::Transport(_) | ForwardError::UpstreamRetryable { .. }
        )
    }

    /// Upstream status code, when the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ForwardError::UpstreamRetryable { status, .. }
            | ForwardError::UpstreamTerminal { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Application-wide error type for the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Input validation failed.
    #[error("{0}")]
    InvalidInput(String),

    /// Requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// Forwarding failed after exhausting the retry budget.
    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    fn kind(&self) -> &'static str {
        match self {
            GatewayError::Database(_) => "database_error",
            GatewayError::InvalidInput(_) => "invalid_request_error",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Forward(e) => e.kind(),
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Forward(_) => StatusCode::BAD_GATEWAY,
        };

        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

/// A specialized Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_kind_round_trip() {
        for pool in PoolKind::ALL {
            assert_eq!(PoolKind::from_db(pool.as_str()), Some(pool));
        }
        assert_eq!(PoolKind::from_db("premium"), None);
    }

    #[test]
    fn test_api_format_defaults_to_openai() {
        assert_eq!(ApiFormat::from_db("anthropic"), ApiFormat::Anthropic);
        assert_eq!(ApiFormat::from_db("openai"), ApiFormat::OpenAI);
        assert_eq!(ApiFormat::from_db("grpc"), ApiFormat::OpenAI);
    }

    #[test]
    fn test_forward_error_retryability() {
        assert!(ForwardError::Transport("connect refused".into()).is_retryable());
        assert!(ForwardError::UpstreamRetryable {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ForwardError::UpstreamTerminal {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!ForwardError::NoEndpoint(PoolKind::Normal).is_retryable());
        assert!(!ForwardError::Unexpected("boom".into()).is_retryable());
    }

    #[test]
    fn test_terminal_error_message_keeps_status_verbatim() {
        let err = ForwardError::UpstreamTerminal {
            status: 401,
            body: "{\"error\":\"invalid key\"}".into(),
        };
        assert!(err.to_string().contains("HTTP 401"));
        assert_eq!(err.kind(), "upstream_terminal");
    }

    #[test]
    fn test_endpoint_update_pool_double_option() {
        // Absent field keeps the current assignment.
        let upd: EndpointUpdate = serde_json::from_str(r#"{"weight": 3}"#).unwrap();
        assert!(upd.pool.is_none());

        // Explicit null clears it.
        let upd: EndpointUpdate = serde_json::from_str(r#"{"pool": null}"#).unwrap();
        assert_eq!(upd.pool, Some(None));

        let upd: EndpointUpdate = serde_json::from_str(r#"{"pool": "tool"}"#).unwrap();
        assert_eq!(upd.pool, Some(Some(PoolKind::Tool)));
    }
}
