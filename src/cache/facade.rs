//! Cache Facade
//!
//! Translates [`SimpleCache`] calls into backend operations: validates keys,
//! turns non-positive TTLs into deletes, serializes values for backends that
//! cannot hold every data type, and maps backend failures onto
//! [`CacheError`](crate::error::CacheError).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{validate_key, SimpleCache};
use crate::error::Result;
use crate::serializer::{Codec, JsonCodec};
use crate::storage::{Capabilities, StorageBackend, ValueMap};

// == TTL Policy ==
/// What a write does with the caller's TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TtlPolicy {
    /// Store, expiring after the given seconds (None = never)
    Store(Option<u64>),
    /// Zero or negative TTL: remove instead of storing
    Invalidate,
}

impl TtlPolicy {
    fn from_ttl(ttl: Option<i64>) -> Self {
        match ttl {
            None => TtlPolicy::Store(None),
            Some(seconds) if seconds < 1 => TtlPolicy::Invalidate,
            Some(seconds) => TtlPolicy::Store(u64::try_from(seconds).ok()),
        }
    }
}

/// Whether values must be encoded before reaching a backend with these
/// capabilities.
fn requires_serialization(capabilities: &Capabilities) -> bool {
    !capabilities.supports_all_natively()
}

// == Cache Facade ==
/// [`SimpleCache`] implementation over a storage backend.
///
/// ```
/// use serde_json::json;
/// use simple_cache::storage::MemoryBackend;
/// use simple_cache::{CacheFacade, SimpleCache};
///
/// let cache = CacheFacade::new(MemoryBackend::new()).unwrap();
/// cache.set("greeting", json!("hello"), Some(60)).unwrap();
/// assert_eq!(cache.get("greeting", None).unwrap(), Some(json!("hello")));
/// ```
#[derive(Debug)]
pub struct CacheFacade<B: StorageBackend> {
    backend: B,
    codec: Arc<dyn Codec>,
    /// Encoded `false`, present only while serializing
    serialized_false: Option<Value>,
}

impl<B: StorageBackend> CacheFacade<B> {
    // == Constructors ==
    /// Creates a facade, serializing with JSON if the backend needs it.
    pub fn new(backend: B) -> Result<Self> {
        Self::with_codec(backend, Arc::new(JsonCodec))
    }

    /// Creates a facade using `codec` whenever the backend cannot store every
    /// data type natively.
    ///
    /// The backend's capabilities are queried once, here.
    pub fn with_codec(backend: B, codec: Arc<dyn Codec>) -> Result<Self> {
        let capabilities = backend.capabilities()?;
        let serialized_false = if requires_serialization(&capabilities) {
            Some(codec.encode(&Value::Bool(false))?)
        } else {
            None
        };

        debug!(
            backend = %backend.id(),
            serialize = serialized_false.is_some(),
            codec = codec.name(),
            "cache facade created"
        );

        Ok(Self {
            backend,
            codec,
            serialized_false,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether the facade encodes values itself.
    pub fn serializes_values(&self) -> bool {
        self.serialized_false.is_some()
    }

    // == Serialization ==
    fn encode(&self, value: Value) -> Result<Value> {
        if self.serializes_values() {
            Ok(self.codec.encode(&value)?)
        } else {
            Ok(value)
        }
    }

    /// Decodes a raw backend value. None means a stored null, or a value
    /// that could not be decoded.
    ///
    /// The encoded `false` is matched before decoding so a stored `false`
    /// never reads as null.
    fn decode(&self, key: &str, raw: Value) -> Option<Value> {
        if self.serialized_false.as_ref() == Some(&raw) {
            return Some(Value::Bool(false));
        }

        match self.codec.decode(&raw) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored value could not be decoded; treating as null");
                None
            }
        }
    }

    fn owned_keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| (*key).to_string()).collect()
    }
}

impl<B: StorageBackend> SimpleCache for CacheFacade<B> {
    // == Get ==
    fn get(&self, key: &str, default: Option<Value>) -> Result<Option<Value>> {
        let result = self.backend.get_item(key)?;

        Ok(match result {
            Some(raw) if self.serializes_values() => self.decode(key, raw).or(default),
            Some(Value::Null) | None => default,
            Some(value) => Some(value),
        })
    }

    // == Set ==
    fn set(&self, key: &str, value: Value, ttl: Option<i64>) -> Result<bool> {
        validate_key(key)?;

        let ttl = match TtlPolicy::from_ttl(ttl) {
            TtlPolicy::Invalidate => {
                debug!(key, "non-positive ttl, deleting instead of storing");
                return self.delete(key);
            }
            TtlPolicy::Store(ttl) => ttl,
        };

        let value = self.encode(value)?;
        Ok(self.backend.set_item(key, value, ttl)?)
    }

    // == Delete ==
    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.backend.remove_item(key)?)
    }

    // == Clear ==
    fn clear(&self) -> Result<bool> {
        match self.backend.flushable() {
            Some(flushable) => Ok(flushable.flush()?),
            None => {
                debug!(backend = %self.backend.id(), "backend cannot flush");
                Ok(false)
            }
        }
    }

    // == Get Multiple ==
    fn get_multiple(&self, keys: &[&str], default: Option<Value>) -> Result<ValueMap> {
        let requested = Self::owned_keys(keys);
        let found = self.backend.get_items(&requested)?;

        let mut results = ValueMap::with_capacity(requested.len());
        for key in requested {
            // Present keys stay in the result; a stored null takes the default
            let stored = found.get(&key).cloned().map(|raw| {
                if self.serializes_values() {
                    self.decode(&key, raw).unwrap_or(Value::Null)
                } else {
                    raw
                }
            });

            let value = match stored {
                Some(Value::Null) => Some(default.clone().unwrap_or(Value::Null)),
                Some(value) => Some(value),
                None => default.clone(),
            };

            if let Some(value) = value {
                results.insert(key, value);
            }
        }

        Ok(results)
    }

    // == Set Multiple ==
    fn set_multiple(&self, values: ValueMap, ttl: Option<i64>) -> Result<bool> {
        for key in values.keys() {
            validate_key(key)?;
        }

        let ttl = match TtlPolicy::from_ttl(ttl) {
            TtlPolicy::Invalidate => {
                debug!(count = values.len(), "non-positive ttl, deleting batch instead of storing");
                let keys: Vec<&str> = values.keys().map(String::as_str).collect();
                return self.delete_multiple(&keys);
            }
            TtlPolicy::Store(ttl) => ttl,
        };

        let encoded = values
            .into_iter()
            .map(|(key, value)| Ok((key, self.encode(value)?)))
            .collect::<Result<ValueMap>>()?;

        let failed = self.backend.set_items(encoded, ttl)?;
        if !failed.is_empty() {
            debug!(failed = ?failed, "backend did not store every key");
        }
        Ok(failed.is_empty())
    }

    // == Delete Multiple ==
    fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        let leftover = self.backend.remove_items(&Self::owned_keys(keys))?;
        Ok(leftover.is_empty())
    }

    // == Has ==
    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.backend.has_item(key)?)
    }
}
