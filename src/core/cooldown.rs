//! Cooldown tracking for failing endpoints.
//!
//! Parking is a fast-failover hint, not a durability concern: the map lives
//! only in memory and a process restart clears it. Each gateway instance
//! observes its own failures, so no cross-process coordination is needed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory map from endpoint id to cooldown expiry.
///
/// Entries expire lazily: any read that observes an elapsed deadline removes
/// the entry. All operations are safe under concurrent callers; the critical
/// sections contain no I/O.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    parked: Mutex<HashMap<i64, Instant>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an endpoint for `duration`, overwriting any prior entry.
    pub fn park(&self, endpoint_id: i64, duration: Duration, reason: &str) {
        let expiry = Instant::now() + duration;
        self.parked.lock().insert(endpoint_id, expiry);
        tracing::info!(
            endpoint_id,
            cooldown_secs = duration.as_secs(),
            reason,
            "endpoint parked"
        );
    }

    /// Whether the endpoint is currently parked. Clears elapsed entries.
    pub fn is_parked(&self, endpoint_id: i64) -> bool {
        let mut parked = self.parked.lock();
        match parked.get(&endpoint_id) {
            None => false,
            Some(expiry) if Instant::now() >= *expiry => {
                parked.remove(&endpoint_id);
                false
            }
            Some(_) => true,
        }
    }

    /// Remaining cooldown in whole seconds; 0 when not parked.
    pub fn remaining(&self, endpoint_id: i64) -> u64 {
        let parked = self.parked.lock();
        parked
            .get(&endpoint_id)
            .map(|expiry| expiry.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    /// Unpark one endpoint.
    pub fn clear(&self, endpoint_id: i64) {
        self.parked.lock().remove(&endpoint_id);
    }

    /// Unpark everything.
    pub fn clear_all(&self) {
        self.parked.lock().clear();
    }

    /// Currently parked endpoints with their remaining seconds. Elapsed
    /// entries are removed as a side effect.
    pub fn snapshot(&self) -> HashMap<i64, u64> {
        let now = Instant::now();
        let mut parked = self.parked.lock();
        parked.retain(|_, expiry| *expiry > now);
        parked
            .iter()
            .map(|(id, expiry)| (*id, expiry.saturating_duration_since(now).as_secs()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_park_and_expire() {
        let tracker = CooldownTracker::new();
        assert!(!tracker.is_parked(1));

        tracker.park(1, Duration::from_millis(20), "HTTP 503");
        assert!(tracker.is_parked(1));
        assert!(tracker.remaining(1) <= 1);

        std::thread::sleep(Duration::from_millis(25));
        assert!(!tracker.is_parked(1));
        // Lazy expiry removed the entry.
        assert_eq!(tracker.remaining(1), 0);
    }

    #[test]
    fn test_park_overwrites_prior_entry() {
        let tracker = CooldownTracker::new();
        tracker.park(7, Duration::from_secs(300), "first");
        tracker.park(7, Duration::from_secs(5), "second");
        assert!(tracker.remaining(7) <= 5);
    }

    #[test]
    fn test_clear() {
        let tracker = CooldownTracker::new();
        tracker.park(1, Duration::from_secs(60), "err");
        tracker.clear(1);
        assert!(!tracker.is_parked(1));
    }

    #[test]
    fn test_clear_all() {
        let tracker = CooldownTracker::new();
        tracker.park(1, Duration::from_secs(60), "err");
        tracker.park(2, Duration::from_secs(60), "err");
        tracker.clear_all();
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_drops_expired() {
        let tracker = CooldownTracker::new();
        tracker.park(1, Duration::from_millis(5), "err");
        tracker.park(2, Duration::from_secs(60), "err");

        std::thread::sleep(Duration::from_millis(10));
        let snapshot = tracker.snapshot();
        assert!(!snapshot.contains_key(&1));
        assert!(snapshot.contains_key(&2));
    }
}
