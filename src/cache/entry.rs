//! Cache Entry Module
//!
//! Defines committed cache entries with TTL support.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A settled, committed cache entry.
///
/// The payload is kept in its encoded form; this is also the shape written to
/// persisted snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Expiration timestamp (Unix milliseconds), 0 = never expires
    #[serde(rename = "expire")]
    pub expire_at: u64,
    /// Encoded payload
    pub data: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `max_age` from now.
    ///
    /// # Arguments
    /// * `data` - The encoded payload
    /// * `max_age` - Time to live, zero means the entry never expires
    pub fn new(data: String, max_age: Duration) -> Self {
        let expire_at = if max_age.is_zero() {
            0
        } else {
            current_timestamp_ms().saturating_add(duration_ms(max_age))
        };

        Self { expire_at, data }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at clock reading `now_ms`.
    ///
    /// An entry is expired once the clock reaches its expiration time.
    /// Entries with `expire_at == 0` never expire.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expire_at != 0 && now_ms >= self.expire_at
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Whole milliseconds in `duration`, rounded up so tiny TTLs still expire later than now.
pub fn duration_ms(duration: Duration) -> u64 {
    let ms = duration.as_millis();
    let ms = if Duration::from_millis(ms as u64) < duration {
        ms + 1
    } else {
        ms
    };
    u64::try_from(ms).unwrap_or(u64::MAX)
}
