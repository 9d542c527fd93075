//! Telemetry sink: one request-log record per terminal per-endpoint outcome,
//! plus the bounded-retention pruner.
//!
//! Logging is best-effort. A failed append must never take down a forward
//! that otherwise succeeded, so errors are traced and swallowed here.

use crate::db::Store;
use crate::types::NewRequestLog;
use std::sync::Arc;
use std::time::Duration;

pub struct Telemetry {
    store: Arc<dyn Store>,
}

impl Telemetry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append one request-log record, swallowing persistence errors.
    pub async fn record(&self, record: NewRequestLog) {
        if let Err(e) = self.store.append_request_log(&record).await {
            tracing::error!(error = %e, "failed to append request log");
        }
    }

    /// Spawn the retention pruner: every `interval`, drop request-log rows
    /// beyond `max_rows` (oldest first). Runs for the process lifetime.
    pub fn spawn_pruner(
        self: &Arc<Self>,
        max_rows: i64,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let telemetry = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                match telemetry.store.prune_request_logs(max_rows).await {
                    Ok(0) => {}
                    Ok(pruned) => {
                        tracing::debug!(pruned, max_rows, "request logs pruned");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "request log pruning failed");
                    }
                }
            }
        })
    }
}
