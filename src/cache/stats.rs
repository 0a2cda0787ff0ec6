//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, evictions, loads and rollbacks.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of `get` calls that returned a value
    pub hits: u64,
    /// Number of `get` calls that found nothing or a stale value
    pub misses: u64,
    /// Number of entries removed by an eviction pass
    pub evictions: u64,
    /// Number of loader results stored
    pub loads: u64,
    /// Number of loader failures delivered to subscribers
    pub load_failures: u64,
    /// Number of optimistic updates rolled back
    pub rollbacks: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current number of entries with at least one listener
    pub listened_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_load(&mut self) {
        self.loads += 1;
    }

    pub fn record_load_failure(&mut self) {
        self.load_failures += 1;
    }

    pub fn record_rollback(&mut self) {
        self.rollbacks += 1;
    }
}
