//! Environment-driven configuration.
//!
//! All settings come from environment variables (a `.env` file is honored via
//! `dotenvy`), with development-friendly defaults so the gateway runs out of
//! the box against a local SQLite file.

use std::env;

/// Runtime settings, loaded once at startup and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address (default: "0.0.0.0").
    pub host: String,
    /// Bind port (default: 8899).
    pub api_port: u16,
    /// Database location: a file path or ":memory:".
    pub database_url: String,
    /// Default parking duration applied when a pool row has no override.
    pub default_cooldown_seconds: i64,
    /// Advisory per-provider retry count stored on new pool rows.
    pub max_retries_per_provider: i64,
    /// Request-log retention cap enforced by the background pruner.
    pub max_logs_count: i64,
    /// Log level handed to the tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Client-visible model name routed to the tool pool.
    pub virtual_model_tool: String,
    /// Client-visible model name routed to the normal pool.
    pub virtual_model_normal: String,
    /// Client-visible model name routed to the advanced pool.
    pub virtual_model_advanced: String,
}

impl Settings {
    /// Load settings from the environment.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Settings {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8899".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./data/gateway.db".to_string()),
            default_cooldown_seconds: env::var("DEFAULT_COOLDOWN_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            max_retries_per_provider: env::var("MAX_RETRIES_PER_PROVIDER")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            max_logs_count: env::var("MAX_LOGS_COUNT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            virtual_model_tool: env::var("VIRTUAL_MODEL_TOOL")
                .unwrap_or_else(|_| "haiku".to_string()),
            virtual_model_normal: env::var("VIRTUAL_MODEL_NORMAL")
                .unwrap_or_else(|_| "sonnet".to_string()),
            virtual_model_advanced: env::var("VIRTUAL_MODEL_ADVANCED")
                .unwrap_or_else(|_| "opus".to_string()),
        })
    }

    /// The virtual model name exposed for a pool.
    pub fn virtual_model_name(&self, pool: crate::types::PoolKind) -> &str {
        use crate::types::PoolKind;
        match pool {
            PoolKind::Tool => &self.virtual_model_tool,
            PoolKind::Normal => &self.virtual_model_normal,
            PoolKind::Advanced => &self.virtual_model_advanced,
        }
    }
}

impl Default for Settings {
    /// Defaults without touching the environment. Used by tests.
    fn default() -> Self {
        Settings {
            host: "0.0.0.0".to_string(),
            api_port: 8899,
            database_url: ":memory:".to_string(),
            default_cooldown_seconds: 60,
            max_retries_per_provider: 3,
            max_logs_count: 10_000,
            log_level: "info".to_string(),
            virtual_model_tool: "haiku".to_string(),
            virtual_model_normal: "sonnet".to_string(),
            virtual_model_advanced: "opus".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolKind;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_port, 8899);
        assert_eq!(settings.default_cooldown_seconds, 60);
        assert_eq!(settings.max_logs_count, 10_000);
        assert_eq!(settings.virtual_model_name(PoolKind::Tool), "haiku");
        assert_eq!(settings.virtual_model_name(PoolKind::Normal), "sonnet");
        assert_eq!(settings.virtual_model_name(PoolKind::Advanced), "opus");
    }
}
