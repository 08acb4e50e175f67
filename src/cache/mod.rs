//! Cache Module
//!
//! The standardized cache contract and the facade implementing it on top of
//! any [`StorageBackend`](crate::storage::StorageBackend).

mod ext;
mod facade;
mod key;

#[cfg(test)]
mod property_tests;

use serde_json::Value;

use crate::error::Result;
use crate::storage::ValueMap;

// Re-export public types
pub use ext::CacheExt;
pub use facade::CacheFacade;
pub use key::{validate_key, MAX_KEY_LENGTH, RESERVED_KEY_CHARS};

// == Simple Cache ==
/// Standardized cache contract.
///
/// A miss is never an error: reads fall back to the caller's default. A TTL
/// of zero or less removes the key(s) instead of storing them.
pub trait SimpleCache {
    /// Fetches a value, or `default` on a miss.
    fn get(&self, key: &str, default: Option<Value>) -> Result<Option<Value>>;

    /// Stores a value. `ttl` is in seconds, None = no expiration.
    fn set(&self, key: &str, value: Value, ttl: Option<i64>) -> Result<bool>;

    fn delete(&self, key: &str) -> Result<bool>;

    /// Removes everything. Returns false when the backend cannot flush.
    fn clear(&self) -> Result<bool>;

    /// Fetches several values.
    ///
    /// Missing keys map to `default` when one is given and are omitted
    /// otherwise.
    fn get_multiple(&self, keys: &[&str], default: Option<Value>) -> Result<ValueMap>;

    /// Stores several values. Every key is validated before anything is written.
    fn set_multiple(&self, values: ValueMap, ttl: Option<i64>) -> Result<bool>;

    /// Removes several keys. True only if none was left behind.
    fn delete_multiple(&self, keys: &[&str]) -> Result<bool>;

    fn has(&self, key: &str) -> Result<bool>;
}
