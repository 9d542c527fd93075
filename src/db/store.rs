//! libsql-backed store.
//!
//! One logical database (a local SQLite file or `:memory:`) holds the
//! providers, endpoints, pools and request logs. The schema is created at
//! startup. The data plane reaches this through the [`Store`] trait; the
//! admin surface uses the inherent CRUD methods directly.

use crate::config::Settings;
use crate::db::traits::Store;
use crate::types::{
    ApiFormat, Endpoint, EndpointCreate, EndpointUpdate, GatewayError, NewRequestLog, Pool,
    PoolEndpoint, PoolKind, PoolUpdate, Provider, ProviderCreate, ProviderUpdate, RequestLog,
    Result,
};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Row, Value};
use std::sync::Arc;

pub struct LibsqlStore {
    conn: Connection,
    settings: Arc<Settings>,
}

fn db_err(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Database(e.to_string())
}

fn opt_text(v: Option<&str>) -> Value {
    match v {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn opt_int(v: Option<i64>) -> Value {
    match v {
        Some(n) => Value::Integer(n),
        None => Value::Null,
    }
}

impl LibsqlStore {
    /// Open (and if necessary create) the database at `settings.database_url`
    /// and ensure the schema exists.
    pub async fn open(settings: Arc<Settings>) -> Result<Self> {
        let url = settings.database_url.clone();
        if url != ":memory:" {
            let path = url.strip_prefix("file:").unwrap_or(&url);
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(db_err)?;
            }
        }

        let db = Builder::new_local(&url).build().await.map_err(db_err)?;
        // A single cloned connection handle avoids per-call reopens, which
        // would split `:memory:` databases.
        let conn = db.connect().map_err(db_err)?;

        let store = Self { conn, settings };
        store.initialize_schema().await?;
        Ok(store)
    }

    fn connection(&self) -> Connection {
        self.conn.clone()
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS providers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                api_key TEXT NOT NULL,
                api_format TEXT NOT NULL DEFAULT 'openai',
                enabled INTEGER NOT NULL DEFAULT 1,
                total_requests INTEGER NOT NULL DEFAULT 0,
                success_requests INTEGER NOT NULL DEFAULT 0,
                error_requests INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| GatewayError::Database(format!("create providers table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS model_endpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id INTEGER NOT NULL,
                model_id TEXT NOT NULL,
                pool TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                weight INTEGER NOT NULL DEFAULT 1,
                min_interval_seconds INTEGER NOT NULL DEFAULT 0,
                last_request_at INTEGER,
                total_requests INTEGER NOT NULL DEFAULT 0,
                success_requests INTEGER NOT NULL DEFAULT 0,
                error_requests INTEGER NOT NULL DEFAULT 0,
                avg_latency_ms REAL NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (provider_id) REFERENCES providers(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| GatewayError::Database(format!("create model_endpoints table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS pools (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pool TEXT UNIQUE NOT NULL,
                virtual_model_name TEXT NOT NULL,
                cooldown_seconds INTEGER NOT NULL DEFAULT 60,
                max_retries INTEGER NOT NULL DEFAULT 3,
                timeout_seconds INTEGER NOT NULL DEFAULT 60,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| GatewayError::Database(format!("create pools table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS request_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pool TEXT NOT NULL,
                requested_model TEXT NOT NULL,
                actual_model TEXT NOT NULL,
                provider_name TEXT NOT NULL,
                success INTEGER NOT NULL DEFAULT 1,
                status_code INTEGER,
                error_message TEXT,
                latency_ms INTEGER NOT NULL DEFAULT 0,
                input_tokens INTEGER,
                output_tokens INTEGER,
                created_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| GatewayError::Database(format!("create request_logs table: {}", e)))?;

        Ok(())
    }

    // ============= Providers =============

    pub async fn list_providers(&self) -> Result<Vec<Provider>> {
        let conn = self.connection();
        let mut rows = conn
            .query(
                "SELECT id, name, base_url, api_key, api_format, enabled,
                        total_requests, success_requests, error_requests, created_at
                 FROM providers ORDER BY id",
                (),
            )
            .await
            .map_err(db_err)?;

        let mut providers = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            providers.push(provider_from_row(&row)?);
        }
        Ok(providers)
    }

    pub async fn get_provider(&self, id: i64) -> Result<Option<Provider>> {
        let conn = self.connection();
        let mut rows = conn
            .query(
                "SELECT id, name, base_url, api_key, api_format, enabled,
                        total_requests, success_requests, error_requests, created_at
                 FROM providers WHERE id = ?1",
                [id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(provider_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn create_provider(&self, create: ProviderCreate) -> Result<Provider> {
        let conn = self.connection();
        let now = Utc::now().timestamp();
        let base_url = create.base_url.trim_end_matches('/').to_string();

        conn.execute(
            "INSERT INTO providers (name, base_url, api_key, api_format, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            (
                create.name,
                base_url,
                create.api_key,
                create.api_format.as_str(),
                create.enabled as i64,
                now,
            ),
        )
        .await
        .map_err(db_err)?;

        let id = conn.last_insert_rowid();
        self.get_provider(id)
            .await?
            .ok_or_else(|| GatewayError::Database("provider vanished after insert".into()))
    }

    pub async fn update_provider(&self, id: i64, update: ProviderUpdate) -> Result<Provider> {
        let current = self
            .get_provider(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("provider {} not found", id)))?;

        let name = update.name.unwrap_or(current.name);
        let base_url = update
            .base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(current.base_url);
        let api_key = update.api_key.unwrap_or(current.api_key);
        let api_format = update.api_format.unwrap_or(current.api_format);
        let enabled = update.enabled.unwrap_or(current.enabled);

        let conn = self.connection();
        conn.execute(
            "UPDATE providers SET name = ?1, base_url = ?2, api_key = ?3, api_format = ?4,
                    enabled = ?5, updated_at = ?6
             WHERE id = ?7",
            (
                name,
                base_url,
                api_key,
                api_format.as_str(),
                enabled as i64,
                Utc::now().timestamp(),
                id,
            ),
        )
        .await
        .map_err(db_err)?;

        self.get_provider(id)
            .await?
            .ok_or_else(|| GatewayError::Database("provider vanished after update".into()))
    }

    /// Delete a provider and all of its endpoints.
    pub async fn delete_provider(&self, id: i64) -> Result<()> {
        let conn = self.connection();
        // Explicit cascade rather than relying on a per-connection pragma.
        conn.execute("DELETE FROM model_endpoints WHERE provider_id = ?1", [id])
            .await
            .map_err(db_err)?;
        let affected = conn
            .execute("DELETE FROM providers WHERE id = ?1", [id])
            .await
            .map_err(db_err)?;
        if affected == 0 {
            return Err(GatewayError::NotFound(format!("provider {} not found", id)));
        }
        Ok(())
    }

    // ============= Endpoints =============

    pub async fn get_endpoint(&self, id: i64) -> Result<Option<Endpoint>> {
        let conn = self.connection();
        let mut rows = conn
            .query(
                &format!("{} WHERE id = ?1", SELECT_ENDPOINT),
                [id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(endpoint_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_provider_endpoints(&self, provider_id: i64) -> Result<Vec<Endpoint>> {
        let conn = self.connection();
        let mut rows = conn
            .query(
                &format!("{} WHERE provider_id = ?1 ORDER BY id", SELECT_ENDPOINT),
                [provider_id],
            )
            .await
            .map_err(db_err)?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            endpoints.push(endpoint_from_row(&row)?);
        }
        Ok(endpoints)
    }

    pub async fn create_endpoint(&self, create: EndpointCreate) -> Result<Endpoint> {
        if self.get_provider(create.provider_id).await?.is_none() {
            return Err(GatewayError::NotFound(format!(
                "provider {} not found",
                create.provider_id
            )));
        }

        let conn = self.connection();
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO model_endpoints
                 (provider_id, model_id, pool, enabled, weight, min_interval_seconds,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            vec![
                Value::Integer(create.provider_id),
                Value::Text(create.model_id),
                opt_text(create.pool.map(|p| p.as_str())),
                Value::Integer(create.enabled as i64),
                Value::Integer(create.weight.max(1)),
                Value::Integer(create.min_interval_seconds.max(0)),
                Value::Integer(now),
            ],
        )
        .await
        .map_err(db_err)?;

        let id = conn.last_insert_rowid();
        self.get_endpoint(id)
            .await?
            .ok_or_else(|| GatewayError::Database("endpoint vanished after insert".into()))
    }

    /// Batch creation; endpoints are inserted in order, stopping on the
    /// first error.
    pub async fn create_endpoints(&self, creates: Vec<EndpointCreate>) -> Result<Vec<Endpoint>> {
        let mut out = Vec::with_capacity(creates.len());
        for create in creates {
            out.push(self.create_endpoint(create).await?);
        }
        Ok(out)
    }

    pub async fn update_endpoint(&self, id: i64, update: EndpointUpdate) -> Result<Endpoint> {
        let current = self
            .get_endpoint(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("endpoint {} not found", id)))?;

        let pool = match update.pool {
            Some(new_pool) => new_pool,
            None => current.pool,
        };
        let enabled = update.enabled.unwrap_or(current.enabled);
        let weight = update.weight.unwrap_or(current.weight).max(1);
        let min_interval = update
            .min_interval_seconds
            .unwrap_or(current.min_interval_seconds)
            .max(0);

        let conn = self.connection();
        conn.execute(
            "UPDATE model_endpoints SET pool = ?1, enabled = ?2, weight = ?3,
                    min_interval_seconds = ?4, updated_at = ?5
             WHERE id = ?6",
            vec![
                opt_text(pool.map(|p| p.as_str())),
                Value::Integer(enabled as i64),
                Value::Integer(weight),
                Value::Integer(min_interval),
                Value::Integer(Utc::now().timestamp()),
                Value::Integer(id),
            ],
        )
        .await
        .map_err(db_err)?;

        self.get_endpoint(id)
            .await?
            .ok_or_else(|| GatewayError::Database("endpoint vanished after update".into()))
    }

    pub async fn delete_endpoint(&self, id: i64) -> Result<()> {
        let conn = self.connection();
        let affected = conn
            .execute("DELETE FROM model_endpoints WHERE id = ?1", [id])
            .await
            .map_err(db_err)?;
        if affected == 0 {
            return Err(GatewayError::NotFound(format!("endpoint {} not found", id)));
        }
        Ok(())
    }

    // ============= Pools =============

    pub async fn list_pools(&self) -> Result<Vec<Pool>> {
        let mut pools = Vec::with_capacity(PoolKind::ALL.len());
        for kind in PoolKind::ALL {
            pools.push(self.get_pool(kind).await?);
        }
        Ok(pools)
    }

    pub async fn update_pool(&self, pool: PoolKind, update: PoolUpdate) -> Result<Pool> {
        let current = self.get_pool(pool).await?;

        let virtual_model_name = update
            .virtual_model_name
            .unwrap_or(current.virtual_model_name);
        let cooldown_seconds = update
            .cooldown_seconds
            .unwrap_or(current.cooldown_seconds)
            .max(0);
        let max_retries = update.max_retries.unwrap_or(current.max_retries).max(0);
        let timeout_seconds = update
            .timeout_seconds
            .unwrap_or(current.timeout_seconds)
            .max(1);

        let conn = self.connection();
        conn.execute(
            "UPDATE pools SET virtual_model_name = ?1, cooldown_seconds = ?2,
                    max_retries = ?3, timeout_seconds = ?4, updated_at = ?5
             WHERE pool = ?6",
            (
                virtual_model_name,
                cooldown_seconds,
                max_retries,
                timeout_seconds,
                Utc::now().timestamp(),
                pool.as_str(),
            ),
        )
        .await
        .map_err(db_err)?;

        self.get_pool(pool).await
    }

    // ============= Request Logs =============

    pub async fn list_request_logs(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RequestLog>, i64)> {
        let conn = self.connection();

        let mut rows = conn
            .query("SELECT COUNT(*) FROM request_logs", ())
            .await
            .map_err(db_err)?;
        let total = match rows.next().await.map_err(db_err)? {
            Some(row) => row.get::<i64>(0).map_err(db_err)?,
            None => 0,
        };

        let mut rows = conn
            .query(
                "SELECT id, pool, requested_model, actual_model, provider_name, success,
                        status_code, error_message, latency_ms, input_tokens, output_tokens,
                        created_at
                 FROM request_logs ORDER BY id DESC LIMIT ?1 OFFSET ?2",
                (limit.max(0), offset.max(0)),
            )
            .await
            .map_err(db_err)?;

        let mut logs = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            logs.push(request_log_from_row(&row)?);
        }
        Ok((logs, total))
    }

    pub async fn delete_request_logs(&self) -> Result<u64> {
        let conn = self.connection();
        let affected = conn
            .execute("DELETE FROM request_logs", ())
            .await
            .map_err(db_err)?;
        Ok(affected)
    }
}

#[async_trait]
impl Store for LibsqlStore {
    async fn list_pool_endpoints(&self, pool: PoolKind) -> Result<Vec<PoolEndpoint>> {
        let conn = self.connection();
        let mut rows = conn
            .query(
                "SELECT e.id, e.provider_id, e.model_id, e.pool, e.enabled, e.weight,
                        e.min_interval_seconds, e.last_request_at, e.total_requests,
                        e.success_requests, e.error_requests, e.avg_latency_ms, e.last_error,
                        e.created_at,
                        p.name, p.base_url, p.api_key, p.api_format
                 FROM model_endpoints e
                 JOIN providers p ON p.id = e.provider_id
                 WHERE e.pool = ?1 AND e.enabled = 1 AND p.enabled = 1
                 ORDER BY e.weight DESC, e.id ASC",
                [pool.as_str()],
            )
            .await
            .map_err(db_err)?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            endpoints.push(PoolEndpoint {
                endpoint: endpoint_from_row(&row)?,
                provider_name: row.get::<String>(14).map_err(db_err)?,
                base_url: row.get::<String>(15).map_err(db_err)?,
                api_key: row.get::<String>(16).map_err(db_err)?,
                api_format: ApiFormat::from_db(&row.get::<String>(17).map_err(db_err)?),
            });
        }
        Ok(endpoints)
    }

    async fn get_pool(&self, pool: PoolKind) -> Result<Pool> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        // Auto-materialize with defaults; harmless when the row exists.
        conn.execute(
            "INSERT OR IGNORE INTO pools
                 (pool, virtual_model_name, cooldown_seconds, max_retries, timeout_seconds,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 60, ?5, ?5)",
            (
                pool.as_str(),
                self.settings.virtual_model_name(pool).to_string(),
                self.settings.default_cooldown_seconds,
                self.settings.max_retries_per_provider,
                now,
            ),
        )
        .await
        .map_err(db_err)?;

        let mut rows = conn
            .query(
                "SELECT pool, virtual_model_name, cooldown_seconds, max_retries, timeout_seconds
                 FROM pools WHERE pool = ?1",
                [pool.as_str()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Pool {
                pool,
                virtual_model_name: row.get::<String>(1).map_err(db_err)?,
                cooldown_seconds: row.get::<i64>(2).map_err(db_err)?,
                max_retries: row.get::<i64>(3).map_err(db_err)?,
                timeout_seconds: row.get::<i64>(4).map_err(db_err)?,
            }),
            None => Err(GatewayError::Database(format!(
                "pool '{}' missing after materialization",
                pool
            ))),
        }
    }

    async fn increment_endpoint_stats(
        &self,
        endpoint_id: i64,
        success: bool,
        latency_ms: i64,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.connection();
        let now = Utc::now().timestamp();

        if success {
            // All right-hand sides see the pre-update column values, so the
            // incremental mean folds the new sample over the old count.
            conn.execute(
                "UPDATE model_endpoints SET
                     total_requests = total_requests + 1,
                     success_requests = success_requests + 1,
                     avg_latency_ms = (avg_latency_ms * success_requests + ?1)
                                          / (success_requests + 1),
                     last_request_at = ?2,
                     last_error = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                (latency_ms as f64, now, endpoint_id),
            )
            .await
            .map_err(db_err)?;

            conn.execute(
                "UPDATE providers SET
                     total_requests = total_requests + 1,
                     success_requests = success_requests + 1,
                     updated_at = ?1
                 WHERE id = (SELECT provider_id FROM model_endpoints WHERE id = ?2)",
                (now, endpoint_id),
            )
            .await
            .map_err(db_err)?;
        } else {
            conn.execute(
                "UPDATE model_endpoints SET
                     total_requests = total_requests + 1,
                     error_requests = error_requests + 1,
                     last_error = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                vec![
                    opt_text(error),
                    Value::Integer(now),
                    Value::Integer(endpoint_id),
                ],
            )
            .await
            .map_err(db_err)?;

            conn.execute(
                "UPDATE providers SET
                     total_requests = total_requests + 1,
                     error_requests = error_requests + 1,
                     updated_at = ?1
                 WHERE id = (SELECT provider_id FROM model_endpoints WHERE id = ?2)",
                (now, endpoint_id),
            )
            .await
            .map_err(db_err)?;
        }

        Ok(())
    }

    async fn append_request_log(&self, record: &NewRequestLog) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            "INSERT INTO request_logs
                 (pool, requested_model, actual_model, provider_name, success, status_code,
                  error_message, latency_ms, input_tokens, output_tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            vec![
                Value::Text(record.pool.as_str().to_string()),
                Value::Text(record.requested_model.clone()),
                Value::Text(record.actual_model.clone()),
                Value::Text(record.provider_name.clone()),
                Value::Integer(record.success as i64),
                opt_int(record.status_code.map(i64::from)),
                opt_text(record.error_message.as_deref()),
                Value::Integer(record.latency_ms),
                opt_int(record.input_tokens),
                opt_int(record.output_tokens),
                Value::Integer(Utc::now().timestamp()),
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn prune_request_logs(&self, max_rows: i64) -> Result<u64> {
        let conn = self.connection();
        let affected = conn
            .execute(
                "DELETE FROM request_logs WHERE id NOT IN
                     (SELECT id FROM request_logs ORDER BY id DESC LIMIT ?1)",
                [max_rows.max(0)],
            )
            .await
            .map_err(db_err)?;
        Ok(affected)
    }
}

const SELECT_ENDPOINT: &str = "SELECT id, provider_id, model_id, pool, enabled, weight,
        min_interval_seconds, last_request_at, total_requests, success_requests,
        error_requests, avg_latency_ms, last_error, created_at
 FROM model_endpoints";

fn provider_from_row(row: &Row) -> Result<Provider> {
    Ok(Provider {
        id: row.get::<i64>(0).map_err(db_err)?,
        name: row.get::<String>(1).map_err(db_err)?,
        base_url: row.get::<String>(2).map_err(db_err)?,
        api_key: row.get::<String>(3).map_err(db_err)?,
        api_format: ApiFormat::from_db(&row.get::<String>(4).map_err(db_err)?),
        enabled: row.get::<i64>(5).map_err(db_err)? != 0,
        total_requests: row.get::<i64>(6).map_err(db_err)?,
        success_requests: row.get::<i64>(7).map_err(db_err)?,
        error_requests: row.get::<i64>(8).map_err(db_err)?,
        created_at: row.get::<i64>(9).map_err(db_err)?,
    })
}

fn endpoint_from_row(row: &Row) -> Result<Endpoint> {
    Ok(Endpoint {
        id: row.get::<i64>(0).map_err(db_err)?,
        provider_id: row.get::<i64>(1).map_err(db_err)?,
        model_id: row.get::<String>(2).map_err(db_err)?,
        pool: row
            .get::<Option<String>>(3)
            .map_err(db_err)?
            .as_deref()
            .and_then(PoolKind::from_db),
        enabled: row.get::<i64>(4).map_err(db_err)? != 0,
        weight: row.get::<i64>(5).map_err(db_err)?,
        min_interval_seconds: row.get::<i64>(6).map_err(db_err)?,
        last_request_at: row.get::<Option<i64>>(7).map_err(db_err)?,
        total_requests: row.get::<i64>(8).map_err(db_err)?,
        success_requests: row.get::<i64>(9).map_err(db_err)?,
        error_requests: row.get::<i64>(10).map_err(db_err)?,
        avg_latency_ms: row.get::<f64>(11).map_err(db_err)?,
        last_error: row.get::<Option<String>>(12).map_err(db_err)?,
        created_at: row.get::<i64>(13).map_err(db_err)?,
    })
}

fn request_log_from_row(row: &Row) -> Result<RequestLog> {
    Ok(RequestLog {
        id: row.get::<i64>(0).map_err(db_err)?,
        pool: PoolKind::from_db(&row.get::<String>(1).map_err(db_err)?)
            .unwrap_or(PoolKind::Normal),
        requested_model: row.get::<String>(2).map_err(db_err)?,
        actual_model: row.get::<String>(3).map_err(db_err)?,
        provider_name: row.get::<String>(4).map_err(db_err)?,
        success: row.get::<i64>(5).map_err(db_err)? != 0,
        status_code: row
            .get::<Option<i64>>(6)
            .map_err(db_err)?
            .map(|c| c as u16),
        error_message: row.get::<Option<String>>(7).map_err(db_err)?,
        latency_ms: row.get::<i64>(8).map_err(db_err)?,
        input_tokens: row.get::<Option<i64>>(9).map_err(db_err)?,
        output_tokens: row.get::<Option<i64>>(10).map_err(db_err)?,
        created_at: row.get::<i64>(11).map_err(db_err)?,
    })
}
