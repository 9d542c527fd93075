//! The persistence contract required by the data plane.
//!
//! The scheduler and forwarder only ever touch the store through this trait,
//! which keeps the core testable against any backend. Every operation is
//! concurrency-safe and transactional at the single-statement level.

use crate::types::{NewRequestLog, Pool, PoolEndpoint, PoolKind, Result};
use async_trait::async_trait;

/// Repository view of providers, endpoints, pools and request logs.
#[async_trait]
pub trait Store: Send + Sync {
    /// Enabled endpoints assigned to `pool`, joined with their enabled
    /// provider, ordered by descending weight (id-ascending within a weight).
    async fn list_pool_endpoints(&self, pool: PoolKind) -> Result<Vec<PoolEndpoint>>;

    /// Pool configuration, auto-created with defaults on first read.
    async fn get_pool(&self, pool: PoolKind) -> Result<Pool>;

    /// Record one terminal attempt outcome on an endpoint.
    ///
    /// Success increments `total`/`success`, folds `latency_ms` into the
    /// incremental mean and advances `last_request_at`. Failure increments
    /// `total`/`error` and records `error` as `last_error`. Provider
    /// aggregate counters move in lockstep.
    async fn increment_endpoint_stats(
        &self,
        endpoint_id: i64,
        success: bool,
        latency_ms: i64,
        error: Option<&str>,
    ) -> Result<()>;

    /// Append one request-log record.
    async fn append_request_log(&self, record: &NewRequestLog) -> Result<()>;

    /// Drop the oldest request-log rows beyond `max_rows`. Returns how many
    /// rows were pruned.
    async fn prune_request_logs(&self, max_rows: i64) -> Result<u64>;
}
