//! Pool manager: health-aware smooth weighted round-robin selection.
//!
//! Given a pool, the manager returns one currently dispatchable endpoint, or
//! none. Selection runs the nginx-style SWRR algorithm over the *available*
//! set — enabled endpoints whose provider is enabled, that are not parked and
//! are outside their min-interval window. SWRR yields a smooth interleaving
//! for mixed weights (weights `{5,1,1}` dispatch as `A,A,B,A,C,A,A`), keeping
//! burstiness off the heavy endpoint.

use crate::core::cooldown::CooldownTracker;
use crate::db::Store;
use crate::types::{ApiFormat, PoolEndpoint, PoolKind, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Everything the forwarder needs to issue one upstream attempt.
#[derive(Debug, Clone)]
pub struct SelectedEndpoint {
    pub endpoint_id: i64,
    pub provider_id: i64,
    pub provider_name: String,
    pub base_url: String,
    pub api_key: String,
    pub model_id: String,
    pub api_format: ApiFormat,
    /// Per-attempt upstream timeout from the pool configuration.
    pub timeout: Duration,
    /// Parking duration the pool prescribes on failure; zero disables parking.
    pub cooldown: Duration,
}

/// SWRR scheduler over the pool registry.
///
/// The per-pool running-weight map is transient process state; entries are
/// pruned whenever an endpoint leaves the available set. The critical section
/// is selection-only and contains no I/O.
pub struct PoolManager {
    store: Arc<dyn Store>,
    cooldown: Arc<CooldownTracker>,
    swrr: Mutex<HashMap<PoolKind, HashMap<i64, i64>>>,
}

impl PoolManager {
    pub fn new(store: Arc<dyn Store>, cooldown: Arc<CooldownTracker>) -> Self {
        Self {
            store,
            cooldown,
            swrr: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown_tracker(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Select one dispatchable endpoint from `pool`, or `None` when the pool
    /// is empty or fully parked/gated.
    pub async fn select(&self, pool: PoolKind) -> Result<Option<SelectedEndpoint>> {
        let pool_cfg = self.store.get_pool(pool).await?;
        let all = self.store.list_pool_endpoints(pool).await?;

        let now = Utc::now().timestamp();
        let mut available: Vec<&PoolEndpoint> = all
            .iter()
            .filter(|pe| {
                let ep = &pe.endpoint;
                if self.cooldown.is_parked(ep.id) {
                    return false;
                }
                if ep.min_interval_seconds > 0 {
                    if let Some(last) = ep.last_request_at {
                        if now < last + ep.min_interval_seconds {
                            tracing::debug!(
                                endpoint_id = ep.id,
                                remaining = last + ep.min_interval_seconds - now,
                                "endpoint inside min-interval window, skipped"
                            );
                            return false;
                        }
                    }
                }
                true
            })
            .collect();

        if available.is_empty() {
            tracing::warn!(pool = %pool, "no endpoint available");
            return Ok(None);
        }

        // Stable iteration order so ties break deterministically.
        available.sort_by_key(|pe| pe.endpoint.id);

        let chosen = {
            let mut swrr = self.swrr.lock();
            let state = swrr.entry(pool).or_default();

            // Prune endpoints that left the available set, then run one SWRR
            // round: bump every running weight by its configured weight, pick
            // the largest, subtract the weight total from the winner.
            let current_ids: Vec<i64> = available.iter().map(|pe| pe.endpoint.id).collect();
            state.retain(|id, _| current_ids.contains(id));

            let total: i64 = available
                .iter()
                .map(|pe| pe.endpoint.weight.max(1))
                .sum();

            let mut best: Option<&PoolEndpoint> = None;
            let mut best_weight = i64::MIN;
            for pe in &available {
                let current = state.entry(pe.endpoint.id).or_insert(0);
                *current += pe.endpoint.weight.max(1);
                if *current > best_weight {
                    best_weight = *current;
                    best = Some(*pe);
                }
            }

            let chosen = match best {
                Some(pe) => pe,
                None => return Ok(None),
            };
            if let Some(current) = state.get_mut(&chosen.endpoint.id) {
                *current -= total;
            }
            chosen.clone()
        };

        tracing::info!(
            pool = %pool,
            provider = %chosen.provider_name,
            model = %chosen.endpoint.model_id,
            weight = chosen.endpoint.weight,
            "endpoint selected"
        );

        Ok(Some(SelectedEndpoint {
            endpoint_id: chosen.endpoint.id,
            provider_id: chosen.endpoint.provider_id,
            provider_name: chosen.provider_name,
            base_url: chosen.base_url,
            api_key: chosen.api_key,
            model_id: chosen.endpoint.model_id,
            api_format: chosen.api_format,
            timeout: Duration::from_secs(pool_cfg.timeout_seconds.max(1) as u64),
            cooldown: Duration::from_secs(pool_cfg.cooldown_seconds.max(0) as u64),
        }))
    }

    /// Record a successful attempt: counters, incremental latency mean,
    /// `last_request_at`, and any lingering cooldown is lifted.
    pub async fn mark_success(&self, endpoint_id: i64, latency_ms: i64) -> Result<()> {
        self.store
            .increment_endpoint_stats(endpoint_id, true, latency_ms, None)
            .await?;
        self.cooldown.clear(endpoint_id);
        Ok(())
    }

    /// Record a failed attempt. Parking is the forwarder's call, made from
    /// the error class, not an automatic side effect here.
    pub async fn mark_failure(&self, endpoint_id: i64, error: &str) -> Result<()> {
        tracing::warn!(endpoint_id, error, "endpoint request failed");
        self.store
            .increment_endpoint_stats(endpoint_id, false, 0, Some(error))
            .await
    }

    /// Live per-pool view for the admin surface. Cooldown figures come from
    /// the in-memory tracker, never from persisted hints.
    pub async fn pool_status(&self, pool: PoolKind) -> Result<PoolStatus> {
        let endpoints = self.store.list_pool_endpoints(pool).await?;

        let mut groups: HashMap<i64, Vec<&PoolEndpoint>> = HashMap::new();
        for pe in &endpoints {
            groups.entry(pe.endpoint.provider_id).or_default().push(pe);
        }

        let mut providers: Vec<ProviderStatus> = Vec::with_capacity(groups.len());
        for (provider_id, eps) in groups {
            let first = match eps.first() {
                Some(pe) => *pe,
                None => continue,
            };

            let models: Vec<EndpointStatus> = eps
                .iter()
                .map(|pe| {
                    let ep = &pe.endpoint;
                    EndpointStatus {
                        id: ep.id,
                        model_id: ep.model_id.clone(),
                        enabled: ep.enabled,
                        weight: ep.weight,
                        is_cooling: self.cooldown.is_parked(ep.id),
                        cooldown_remaining: self.cooldown.remaining(ep.id),
                        total_requests: ep.total_requests,
                        success_requests: ep.success_requests,
                        success_rate: if ep.total_requests > 0 {
                            (ep.success_requests as f64 / ep.total_requests as f64 * 10_000.0)
                                .round()
                                / 100.0
                        } else {
                            0.0
                        },
                        avg_latency_ms: (ep.avg_latency_ms * 100.0).round() / 100.0,
                        min_interval_seconds: ep.min_interval_seconds,
                        last_error: ep.last_error.clone(),
                    }
                })
                .collect();

            let healthy_count = models.iter().filter(|m| !m.is_cooling).count();
            providers.push(ProviderStatus {
                provider_id,
                provider_name: first.provider_name.clone(),
                base_url: first.base_url.clone(),
                api_format: first.api_format,
                healthy_count,
                total_count: models.len(),
                models,
            });
        }
        providers.sort_by_key(|p| p.provider_id);

        let healthy_endpoints = providers.iter().map(|p| p.healthy_count).sum();
        Ok(PoolStatus {
            pool,
            total_endpoints: endpoints.len(),
            healthy_endpoints,
            providers,
        })
    }

    #[cfg(test)]
    fn swrr_keys(&self, pool: PoolKind) -> Vec<i64> {
        let swrr = self.swrr.lock();
        let mut keys: Vec<i64> = swrr
            .get(&pool)
            .map(|state| state.keys().copied().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }
}

// ============= Status Views =============

/// Admin view of one pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolStatus {
    pub pool: PoolKind,
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
    pub providers: Vec<ProviderStatus>,
}

/// Admin view of one provider's endpoints inside a pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderStatus {
    pub provider_id: i64,
    pub provider_name: String,
    pub base_url: String,
    pub api_format: ApiFormat,
    pub healthy_count: usize,
    pub total_count: usize,
    pub models: Vec<EndpointStatus>,
}

/// Admin view of one endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointStatus {
    pub id: i64,
    pub model_id: String,
    pub enabled: bool,
    pub weight: i64,
    pub is_cooling: bool,
    pub cooldown_remaining: u64,
    pub total_requests: i64,
    pub success_requests: i64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub min_interval_seconds: i64,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endpoint, NewRequestLog, Pool};
    use async_trait::async_trait;

    /// Store double holding a fixed endpoint set in memory.
    struct StubStore {
        endpoints: Mutex<Vec<PoolEndpoint>>,
        stats: Mutex<Vec<(i64, bool, i64)>>,
    }

    impl StubStore {
        fn new(endpoints: Vec<PoolEndpoint>) -> Self {
            Self {
                endpoints: Mutex::new(endpoints),
                stats: Mutex::new(Vec::new()),
            }
        }

        fn set_endpoints(&self, endpoints: Vec<PoolEndpoint>) {
            *self.endpoints.lock() = endpoints;
        }
    }

    #[async_trait]
    impl Store for StubStore {
        async fn list_pool_endpoints(&self, pool: PoolKind) -> Result<Vec<PoolEndpoint>> {
            let mut eps: Vec<PoolEndpoint> = self
                .endpoints
                .lock()
                .iter()
                .filter(|pe| pe.endpoint.pool == Some(pool))
                .cloned()
                .collect();
            eps.sort_by(|a, b| {
                b.endpoint
                    .weight
                    .cmp(&a.endpoint.weight)
                    .then(a.endpoint.id.cmp(&b.endpoint.id))
            });
            Ok(eps)
        }

        async fn get_pool(&self, pool: PoolKind) -> Result<Pool> {
            Ok(Pool {
                pool,
                virtual_model_name: "sonnet".into(),
                cooldown_seconds: 60,
                max_retries: 3,
                timeout_seconds: 60,
            })
        }

        async fn increment_endpoint_stats(
            &self,
            endpoint_id: i64,
            success: bool,
            latency_ms: i64,
            _error: Option<&str>,
        ) -> Result<()> {
            self.stats.lock().push((endpoint_id, success, latency_ms));
            Ok(())
        }

        async fn append_request_log(&self, _record: &NewRequestLog) -> Result<()> {
            Ok(())
        }

        async fn prune_request_logs(&self, _max_rows: i64) -> Result<u64> {
            Ok(0)
        }
    }

    fn endpoint(id: i64, weight: i64) -> PoolEndpoint {
        PoolEndpoint {
            endpoint: Endpoint {
                id,
                provider_id: 1,
                model_id: format!("model-{}", id),
                pool: Some(PoolKind::Normal),
                enabled: true,
                weight,
                min_interval_seconds: 0,
                last_request_at: None,
                total_requests: 0,
                success_requests: 0,
                error_requests: 0,
                avg_latency_ms: 0.0,
                last_error: None,
                created_at: 0,
            },
            provider_name: "stub".into(),
            base_url: "http://localhost:9999".into(),
            api_key: "key".into(),
            api_format: ApiFormat::OpenAI,
        }
    }

    fn manager(endpoints: Vec<PoolEndpoint>) -> (PoolManager, Arc<StubStore>) {
        let store = Arc::new(StubStore::new(endpoints));
        let mgr = PoolManager::new(store.clone(), Arc::new(CooldownTracker::new()));
        (mgr, store)
    }

    async fn dispatch_sequence(mgr: &PoolManager, n: usize) -> Vec<i64> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let selected = mgr.select(PoolKind::Normal).await.unwrap().unwrap();
            out.push(selected.endpoint_id);
        }
        out
    }

    #[tokio::test]
    async fn test_swrr_weights_3_1() {
        let (mgr, _) = manager(vec![endpoint(1, 3), endpoint(2, 1)]);
        assert_eq!(dispatch_sequence(&mgr, 4).await, vec![1, 1, 2, 1]);
    }

    #[tokio::test]
    async fn test_swrr_weights_5_1_1_is_smooth() {
        let (mgr, _) = manager(vec![endpoint(1, 5), endpoint(2, 1), endpoint(3, 1)]);
        assert_eq!(
            dispatch_sequence(&mgr, 7).await,
            vec![1, 1, 2, 1, 3, 1, 1]
        );
    }

    #[tokio::test]
    async fn test_swrr_proportions_over_full_cycles() {
        let (mgr, _) = manager(vec![endpoint(1, 2), endpoint(2, 1)]);
        let seq = dispatch_sequence(&mgr, 9).await;
        assert_eq!(seq.iter().filter(|&&id| id == 1).count(), 6);
        assert_eq!(seq.iter().filter(|&&id| id == 2).count(), 3);
    }

    #[tokio::test]
    async fn test_zero_weight_counts_as_one() {
        let (mgr, _) = manager(vec![endpoint(1, 0), endpoint(2, 1)]);
        let seq = dispatch_sequence(&mgr, 4).await;
        assert_eq!(seq.iter().filter(|&&id| id == 1).count(), 2);
        assert_eq!(seq.iter().filter(|&&id| id == 2).count(), 2);
    }

    #[tokio::test]
    async fn test_empty_pool_returns_none() {
        let (mgr, _) = manager(vec![]);
        assert!(mgr.select(PoolKind::Normal).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parked_endpoint_is_never_selected() {
        let (mgr, _) = manager(vec![endpoint(1, 1), endpoint(2, 1)]);
        mgr.cooldown_tracker()
            .park(1, Duration::from_secs(60), "HTTP 503");

        let seq = dispatch_sequence(&mgr, 4).await;
        assert_eq!(seq, vec![2, 2, 2, 2]);
    }

    #[tokio::test]
    async fn test_all_parked_returns_none() {
        let (mgr, _) = manager(vec![endpoint(1, 1)]);
        mgr.cooldown_tracker()
            .park(1, Duration::from_secs(60), "HTTP 503");
        assert!(mgr.select(PoolKind::Normal).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_min_interval_gates_endpoint() {
        let mut gated = endpoint(1, 10);
        gated.endpoint.min_interval_seconds = 3600;
        gated.endpoint.last_request_at = Some(Utc::now().timestamp());
        let (mgr, _) = manager(vec![gated, endpoint(2, 1)]);

        assert_eq!(dispatch_sequence(&mgr, 3).await, vec![2, 2, 2]);
    }

    #[tokio::test]
    async fn test_min_interval_elapsed_endpoint_is_eligible() {
        let mut ep = endpoint(1, 1);
        ep.endpoint.min_interval_seconds = 10;
        ep.endpoint.last_request_at = Some(Utc::now().timestamp() - 60);
        let (mgr, _) = manager(vec![ep]);

        assert!(mgr.select(PoolKind::Normal).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_swrr_state_pruned_when_endpoint_leaves() {
        let (mgr, store) = manager(vec![endpoint(1, 1), endpoint(2, 1)]);
        mgr.select(PoolKind::Normal).await.unwrap();
        assert_eq!(mgr.swrr_keys(PoolKind::Normal), vec![1, 2]);

        store.set_endpoints(vec![endpoint(2, 1)]);
        mgr.select(PoolKind::Normal).await.unwrap();
        assert_eq!(mgr.swrr_keys(PoolKind::Normal), vec![2]);
    }

    #[tokio::test]
    async fn test_mark_success_clears_cooldown_and_records_stats() {
        let (mgr, store) = manager(vec![endpoint(1, 1)]);
        mgr.cooldown_tracker()
            .park(1, Duration::from_secs(60), "HTTP 503");

        mgr.mark_success(1, 420).await.unwrap();
        assert!(!mgr.cooldown_tracker().is_parked(1));
        assert_eq!(store.stats.lock().as_slice(), &[(1, true, 420)]);
    }

    #[tokio::test]
    async fn test_mark_failure_does_not_park() {
        let (mgr, store) = manager(vec![endpoint(1, 1)]);
        mgr.mark_failure(1, "HTTP 500: oops").await.unwrap();
        assert!(!mgr.cooldown_tracker().is_parked(1));
        assert_eq!(store.stats.lock().as_slice(), &[(1, false, 0)]);
    }
}
