//! Cache Statistics Module
//!
//! Tracks how invocations were served and why entries left the table.

use serde::Serialize;

// == Cache Stats ==
/// Counters for one handler.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Invocations served from a committed entry
    pub hits: u64,
    /// Invocations that started the producer
    pub misses: u64,
    /// Invocations that joined an in-flight producer call
    pub joins: u64,
    /// Invocations whose arguments had no cache key
    pub uncacheable: u64,
    /// Provisional entries dropped because the producer failed
    pub rejections: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the table
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of cacheable invocations that did not start the producer.
    ///
    /// Returns 0.0 if no cacheable invocation has been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.joins;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_join(&mut self) {
        self.joins += 1;
    }

    pub fn record_uncacheable(&mut self) {
        self.uncacheable += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
