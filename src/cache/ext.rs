//! Typed helpers on top of [`SimpleCache`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::SimpleCache;
use crate::error::{BackendError, CacheError, Result};

/// Extension trait with typed methods for convenience.
///
/// Values go through `serde_json::Value`, so any serde type can be cached.
pub trait CacheExt: SimpleCache {
    /// Gets a typed value. A stored value of another shape is an error.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key, None)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| CacheError::from_backend(BackendError::from(err))),
            None => Ok(None),
        }
    }

    /// Sets a typed value.
    fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<i64>) -> Result<bool> {
        let value = serde_json::to_value(value).map_err(|err| {
            CacheError::invalid_argument(format!("Value for \"{}\" cannot be cached: {}", key, err))
        })?;
        self.set(key, value, ttl)
    }

    /// Gets a typed value, or computes and stores it on a miss.
    ///
    /// Storing is best effort: a backend failure is not reported and the
    /// computed value is returned regardless. An invalid key or a value that
    /// cannot be cached is still an error.
    fn get_or_set_with<T, F>(&self, key: &str, ttl: Option<i64>, factory: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(cached) = self.get_as::<T>(key)? {
            return Ok(cached);
        }

        let value = factory()?;
        match self.set_as(key, &value, ttl) {
            Err(err) if err.is_invalid_argument() => Err(err),
            _ => Ok(value),
        }
    }
}

// Blanket implementation for every SimpleCache
impl<C: SimpleCache + ?Sized> CacheExt for C {}
