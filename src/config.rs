//! Configuration Module
//!
//! Loads cache wiring options from environment variables.

use std::env;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Priority the serializer interceptor is attached with
    pub serializer_priority: i32,
    /// Maximum key length enforced by the reference backend, if any
    pub backend_max_key_length: Option<usize>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SERIALIZER_PRIORITY` - Serializer interceptor priority (default: 1)
    /// - `CACHE_MAX_KEY_LENGTH` - Backend key length limit (default: unlimited)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            serializer_priority: env::var("CACHE_SERIALIZER_PRIORITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.serializer_priority),
            backend_max_key_length: env::var("CACHE_MAX_KEY_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.backend_max_key_length),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serializer_priority: 1,
            backend_max_key_length: None,
        }
    }
}
