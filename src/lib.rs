//! # API Pool Gateway
//!
//! An LLM API reverse-proxy that fronts a heterogeneous fleet of upstream
//! chat/completions providers and exposes a small set of stable virtual
//! model names. Incoming requests in either the OpenAI chat-completions
//! shape or the Anthropic messages shape are routed to one of three logical
//! pools (`tool`, `normal`, `advanced`) by the requested model name. Within
//! a pool, endpoints are picked by health-aware smooth weighted round-robin;
//! responses stream back with heartbeats, and transient upstream failures
//! fail over across endpoints with exponential backoff.
//!
//! ## Overview
//!
//! The gateway can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `gateway-server` binary
//! 2. **As a library** - Import the data-plane components into your own
//!    Rust project
//!
//! ### Quick Start
//!
//! ```rust,ignore
//! use gateway::{AppState, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::initialize(Settings::from_env()?).await?;
//!     let app = gateway::api::router().with_state(state);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8899").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`api`] - HTTP surface: gateway routes, admin CRUD, health
//! - [`core`] - Data plane: cooldown tracker, SWRR pool manager, forwarder
//! - [`db`] - libsql store and the persistence contract
//! - [`telemetry`] - Request-log sink and retention pruner
//! - [`types`] - Data model and error types
//!
//! ## Architecture
//!
//! All shared components (store, cooldown tracker, pool manager, forwarder,
//! telemetry) are built once in [`AppState::initialize`] and injected into
//! request handlers through axum state — no lazily-discovered globals.

/// HTTP API handlers and routes.
pub mod api;
/// Environment-driven configuration.
pub mod config;
/// The forwarding data plane.
pub mod core;
/// Persistence: libsql store and repository contract.
pub mod db;
/// Request-log sink and retention pruner.
pub mod telemetry;
/// Common types and error handling.
pub mod types;

// Re-export commonly used types
pub use crate::core::{CooldownTracker, ForwardReply, Forwarder, PoolManager};
pub use config::Settings;
pub use db::{LibsqlStore, Store};
pub use telemetry::Telemetry;
pub use types::{ForwardError, GatewayError, PoolKind, Result};

use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runtime settings.
    pub settings: Arc<Settings>,
    /// libsql store (admin surface uses it directly).
    pub store: Arc<LibsqlStore>,
    /// SWRR scheduler with its cooldown tracker.
    pub pool_manager: Arc<PoolManager>,
    /// Request forwarder.
    pub forwarder: Arc<Forwarder>,
    /// Request-log sink.
    pub telemetry: Arc<Telemetry>,
}

impl AppState {
    /// Single initialization point for all process-wide components: open the
    /// store, wire the cooldown tracker, scheduler, telemetry and forwarder.
    pub async fn initialize(settings: Settings) -> Result<Self> {
        let settings = Arc::new(settings);
        let store = Arc::new(LibsqlStore::open(Arc::clone(&settings)).await?);

        let cooldown = Arc::new(CooldownTracker::new());
        let pool_manager = Arc::new(PoolManager::new(
            store.clone() as Arc<dyn Store>,
            cooldown,
        ));
        let telemetry = Arc::new(Telemetry::new(store.clone() as Arc<dyn Store>));
        let forwarder = Arc::new(Forwarder::new(
            Arc::clone(&pool_manager),
            Arc::clone(&telemetry),
        )?);

        Ok(Self {
            settings,
            store,
            pool_manager,
            forwarder,
            telemetry,
        })
    }
}
