//! Gateway server binary.
//!
//! This is the main entry point for running the gateway as a standalone
//! server. For library usage, import from the `gateway` crate instead.

use gateway::{AppState, Settings};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the request-log pruner runs.
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // =================================================================
    // Load Configuration
    // =================================================================
    let settings = Settings::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    // =================================================================
    // Initialize Tracing
    // =================================================================
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API Pool Gateway");

    // =================================================================
    // Initialize Application State
    // =================================================================
    // Store, cooldown tracker, pool manager, telemetry and forwarder are all
    // built here once and injected into handlers.
    let state = AppState::initialize(settings).await?;
    tracing::info!(database = %state.settings.database_url, "store initialized");

    // =================================================================
    // Background Tasks
    // =================================================================
    let _pruner = state
        .telemetry
        .spawn_pruner(state.settings.max_logs_count, PRUNE_INTERVAL);

    // =================================================================
    // Build Router
    // =================================================================
    let app = gateway::api::router()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", api_doc()),
    );

    // =================================================================
    // Start Server
    // =================================================================
    let addr = format!("{}:{}", state.settings.host, state.settings.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("gateway listening on http://{}", addr);
    tracing::info!("  - Anthropic API: POST /v1/messages");
    tracing::info!("  - OpenAI API:    POST /v1/chat/completions");
    tracing::info!(
        "  - virtual models: {}, {}, {}",
        state.settings.virtual_model_tool,
        state.settings.virtual_model_normal,
        state.settings.virtual_model_advanced
    );

    axum::serve(listener, app).await?;

    tracing::info!("gateway shut down");
    Ok(())
}

#[cfg(feature = "swagger-ui")]
fn api_doc() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            gateway::api::handlers::openai::chat_completions,
            gateway::api::handlers::openai::list_models,
            gateway::api::handlers::anthropic::messages,
            gateway::api::handlers::admin::list_providers,
            gateway::api::handlers::admin::create_provider,
            gateway::api::handlers::admin::pool_status,
            gateway::api::handlers::admin::list_logs,
        ),
        components(schemas(
            gateway::types::Provider,
            gateway::types::Endpoint,
            gateway::types::Pool,
            gateway::types::RequestLog,
            gateway::types::ProviderCreate,
            gateway::types::PoolKind,
            gateway::types::ApiFormat,
        )),
        tags(
            (name = "gateway", description = "Forwarding data plane"),
            (name = "admin", description = "Provider/endpoint/pool management"),
        ),
        info(
            title = "API Pool Gateway",
            version = "0.3.0",
            description = "Multi-provider model pool gateway speaking OpenAI and Anthropic wire formats"
        )
    )]
    struct ApiDoc;

    ApiDoc::openapi()
}
