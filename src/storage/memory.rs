//! Memory Backend Module
//!
//! Reference backend keeping entries in a HashMap with per-entry expiry.
//! It honours its own capability descriptor, which makes it useful for
//! exercising the facade against restricted backends.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{BackendError, BackendResult};
use crate::storage::{
    BackendId, BackendOptions, Capabilities, CapabilitiesBuilder, DataType, Flushable,
    StorageBackend, StoredEntry, TypeSupport, ValueMap,
};

// == Memory Backend ==
/// In-memory backend implementing the full storage contract.
#[derive(Debug)]
pub struct MemoryBackend {
    /// Identity reported in capabilities
    id: BackendId,
    /// Key-value storage
    entries: RwLock<HashMap<String, StoredEntry>>,
    /// Backend-wide configuration
    options: RwLock<BackendOptions>,
    /// What this backend accepts
    capabilities: Arc<Capabilities>,
}

impl MemoryBackend {
    // == Constructors ==
    /// Creates a backend storing every data type natively.
    pub fn new() -> Self {
        Self::with_capabilities(CapabilitiesBuilder::all_native)
    }

    /// Creates a backend whose descriptor is shaped by `configure`.
    ///
    /// ```
    /// use simple_cache::storage::{DataType, MemoryBackend, TypeSupport};
    ///
    /// let backend = MemoryBackend::with_capabilities(|caps| {
    ///     caps.support(DataType::String, TypeSupport::Native)
    ///         .max_key_length(32)
    /// });
    /// ```
    pub fn with_capabilities<F>(configure: F) -> Self
    where
        F: FnOnce(CapabilitiesBuilder) -> CapabilitiesBuilder,
    {
        let id = BackendId::new();
        let capabilities = configure(Capabilities::builder(id)).build();
        Self {
            id,
            entries: RwLock::new(HashMap::new()),
            options: RwLock::new(BackendOptions::default()),
            capabilities: Arc::new(capabilities),
        }
    }

    /// Creates a backend that only keeps strings, converting scalars and
    /// rejecting arrays and objects.
    pub fn string_only() -> Self {
        Self::with_capabilities(|caps| {
            caps.support(DataType::String, TypeSupport::Native)
                .support(DataType::Null, TypeSupport::Converted(DataType::String))
                .support(DataType::Boolean, TypeSupport::Converted(DataType::String))
                .support(DataType::Integer, TypeSupport::Converted(DataType::String))
                .support(DataType::Float, TypeSupport::Converted(DataType::String))
                .support(DataType::Array, TypeSupport::Unsupported)
                .support(DataType::Object, TypeSupport::Unsupported)
        })
    }

    /// Creates a backend from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_capabilities(|caps| {
            let caps = caps.all_native();
            match config.backend_max_key_length {
                Some(length) => caps.max_key_length(length),
                None => caps,
            }
        })
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(backend = %self.id, removed, "purged expired entries");
        }
        removed
    }

    // == Length ==
    /// Number of entries held, including ones that expired but were not purged yet.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Raw entry for inspection, ignoring expiry.
    pub fn entry(&self, key: &str) -> Option<StoredEntry> {
        self.entries.read().get(key).cloned()
    }

    // == Validation ==
    fn check_key(&self, key: &str) -> BackendResult<()> {
        if key.is_empty() {
            return Err(BackendError::InvalidArgument(
                "An empty key is not allowed".to_string(),
            ));
        }
        if let Some(max) = self.capabilities.max_key_length() {
            if key.chars().count() > max {
                return Err(BackendError::InvalidArgument(format!(
                    "The key '{}' is longer than the allowed maximum of {} characters",
                    key, max
                )));
            }
        }
        Ok(())
    }

    /// Applies the descriptor's type rules to a value about to be stored.
    fn prepare_value(&self, value: Value) -> BackendResult<Value> {
        let data_type = DataType::of(&value);
        match self.capabilities.support_for(data_type) {
            TypeSupport::Native => Ok(value),
            TypeSupport::Converted(DataType::String) => Ok(Value::String(stringify(&value))),
            TypeSupport::Converted(_) | TypeSupport::Unsupported => {
                Err(BackendError::UnsupportedType(data_type))
            }
        }
    }

    fn prepare_items(&self, items: ValueMap) -> BackendResult<Vec<(String, Value)>> {
        items
            .into_iter()
            .map(|(key, value)| {
                self.check_key(&key)?;
                Ok((key, self.prepare_value(value)?))
            })
            .collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// String form used for types the descriptor converts to strings.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns the live value for `key`, dropping it if it expired.
fn read_live(
    entries: &mut HashMap<String, StoredEntry>,
    key: &str,
    now: DateTime<Utc>,
) -> Option<Value> {
    if entries.get(key)?.is_expired_at(now) {
        entries.remove(key);
        return None;
    }
    entries.get(key).map(|entry| entry.value.clone())
}

impl StorageBackend for MemoryBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn options(&self) -> BackendOptions {
        self.options.read().clone()
    }

    fn set_options(&self, options: BackendOptions) {
        *self.options.write() = options;
    }

    fn get_item(&self, key: &str) -> BackendResult<Option<Value>> {
        let mut entries = self.entries.write();
        Ok(read_live(&mut entries, key, Utc::now()))
    }

    fn get_items(&self, keys: &[String]) -> BackendResult<ValueMap> {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let mut found = ValueMap::new();
        for key in keys {
            if let Some(value) = read_live(&mut entries, key, now) {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn has_item(&self, key: &str) -> BackendResult<bool> {
        let mut entries = self.entries.write();
        Ok(read_live(&mut entries, key, Utc::now()).is_some())
    }

    fn set_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool> {
        self.check_key(key)?;
        let value = self.prepare_value(value)?;
        self.entries
            .write()
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }

    fn set_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>> {
        let prepared = self.prepare_items(items)?;
        let mut entries = self.entries.write();
        for (key, value) in prepared {
            entries.insert(key, StoredEntry::new(value, ttl));
        }
        Ok(Vec::new())
    }

    fn add_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool> {
        self.check_key(key)?;
        let value = self.prepare_value(value)?;
        let mut entries = self.entries.write();
        if read_live(&mut entries, key, Utc::now()).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }

    fn add_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>> {
        let prepared = self.prepare_items(items)?;
        let now = Utc::now();
        let mut entries = self.entries.write();
        let mut skipped = Vec::new();
        for (key, value) in prepared {
            if read_live(&mut entries, &key, now).is_some() {
                skipped.push(key);
            } else {
                entries.insert(key, StoredEntry::new(value, ttl));
            }
        }
        Ok(skipped)
    }

    fn replace_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool> {
        self.check_key(key)?;
        let value = self.prepare_value(value)?;
        let mut entries = self.entries.write();
        if read_live(&mut entries, key, Utc::now()).is_none() {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }

    fn replace_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>> {
        let prepared = self.prepare_items(items)?;
        let now = Utc::now();
        let mut entries = self.entries.write();
        let mut skipped = Vec::new();
        for (key, value) in prepared {
            if read_live(&mut entries, &key, now).is_none() {
                skipped.push(key);
            } else {
                entries.insert(key, StoredEntry::new(value, ttl));
            }
        }
        Ok(skipped)
    }

    fn check_and_set_item(
        &self,
        token: &Value,
        key: &str,
        value: Value,
        ttl: Option<u64>,
    ) -> BackendResult<bool> {
        self.check_key(key)?;
        let value = self.prepare_value(value)?;
        let mut entries = self.entries.write();
        match read_live(&mut entries, key, Utc::now()) {
            Some(current) if current == *token => {
                entries.insert(key.to_string(), StoredEntry::new(value, ttl));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove_item(&self, key: &str) -> BackendResult<bool> {
        let mut entries = self.entries.write();
        let existed = read_live(&mut entries, key, Utc::now()).is_some();
        entries.remove(key);
        Ok(existed)
    }

    fn remove_items(&self, keys: &[String]) -> BackendResult<Vec<String>> {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let mut missing = Vec::new();
        for key in keys {
            if read_live(&mut entries, key, now).is_some() {
                entries.remove(key);
            } else {
                missing.push(key.clone());
            }
        }
        Ok(missing)
    }

    fn capabilities(&self) -> BackendResult<Arc<Capabilities>> {
        Ok(Arc::clone(&self.capabilities))
    }

    fn flushable(&self) -> Option<&dyn Flushable> {
        Some(self)
    }
}

impl Flushable for MemoryBackend {
    fn flush(&self) -> BackendResult<bool> {
        self.entries.write().clear();
        Ok(true)
    }
}
