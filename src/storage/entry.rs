//! Stored Entry Module
//!
//! A value held by the reference backend together with its expiry metadata.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

// == Stored Entry ==
/// A single entry held by [`MemoryBackend`](crate::storage::MemoryBackend).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    /// The stored value
    pub value: Value,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// When the entry stops being visible, None = never
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry with an optional TTL in seconds.
    pub fn new(value: Value, ttl_seconds: Option<u64>) -> Self {
        let now = Utc::now();
        let expires_at = ttl_seconds.map(|ttl| {
            i64::try_from(ttl)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now`.
    ///
    /// An entry is expired once `now` reaches its expiration time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks whether the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    // == Time To Live ==
    /// Remaining lifetime in whole seconds, or None if the entry never expires.
    ///
    /// Returns `Some(0)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let remaining = expires - Utc::now();
            u64::try_from(remaining.num_seconds()).unwrap_or(0)
        })
    }
}
