//! Storage Module
//!
//! The capability contract a key/value backend must fulfil to sit behind the
//! cache facade, plus a small in-memory reference backend.

mod capabilities;
mod entry;
mod memory;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use crate::error::BackendResult;

pub use capabilities::{Capabilities, CapabilitiesBuilder, DataType, TypeSupport};
pub use entry::StoredEntry;
pub use memory::MemoryBackend;

/// Key/value pairs in insertion order.
pub type ValueMap = IndexMap<String, Value>;

// == Backend Id ==
/// Stable identifier of a backend instance.
///
/// Assigned once when the backend is created and never reused, so it can key
/// caches that must not outlive the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(Uuid);

impl BackendId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BackendId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// == Backend Options ==
/// Mutable backend-wide configuration.
///
/// The facade never reads or writes it: every write carries its own TTL.
/// The default `ttl` is for a backend's other clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOptions {
    /// Default TTL in seconds, 0 = never expire
    pub ttl: u64,
}

// == Flushable ==
/// Optional bulk-flush capability.
pub trait Flushable {
    /// Removes every entry. Returns whether the flush succeeded.
    fn flush(&self) -> BackendResult<bool>;
}

// == Storage Backend ==
/// Operations every backend offers to the facade.
///
/// The `ttl` passed to write operations applies to that call only: `None`
/// means the entry never expires, `Some(n)` expires it after `n` seconds.
/// Backends must not change their configured options because of it.
pub trait StorageBackend: Send + Sync {
    /// Identity of this backend instance.
    fn id(&self) -> BackendId;

    /// Snapshot of the backend configuration.
    fn options(&self) -> BackendOptions;

    /// Replaces the backend configuration.
    fn set_options(&self, options: BackendOptions);

    /// Fetches one item. `None` signals a miss.
    fn get_item(&self, key: &str) -> BackendResult<Option<Value>>;

    /// Fetches several items; only found keys are returned.
    fn get_items(&self, keys: &[String]) -> BackendResult<ValueMap>;

    /// Tests whether a key is present.
    fn has_item(&self, key: &str) -> BackendResult<bool>;

    /// Stores one item, overwriting any previous value.
    fn set_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool>;

    /// Stores several items. Returns the keys that could not be stored.
    fn set_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>>;

    /// Stores one item only if the key is absent.
    fn add_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool>;

    /// Stores several items, each only if its key is absent. Returns the keys
    /// that were not stored.
    fn add_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>>;

    /// Stores one item only if the key is present.
    fn replace_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool>;

    /// Stores several items, each only if its key is present. Returns the keys
    /// that were not stored.
    fn replace_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>>;

    /// Stores one item only if the currently stored value equals `token`.
    fn check_and_set_item(
        &self,
        token: &Value,
        key: &str,
        value: Value,
        ttl: Option<u64>,
    ) -> BackendResult<bool>;

    /// Removes one item. Returns whether it existed.
    fn remove_item(&self, key: &str) -> BackendResult<bool>;

    /// Removes several items. Returns the keys that were not removed.
    fn remove_items(&self, keys: &[String]) -> BackendResult<Vec<String>>;

    /// Describes what the backend supports.
    fn capabilities(&self) -> BackendResult<Arc<Capabilities>>;

    /// Bulk-flush support, if the backend has it.
    fn flushable(&self) -> Option<&dyn Flushable> {
        None
    }
}
