//! Simple Cache - A standardized cache facade over pluggable storage backends
//!
//! Provides key validation, TTL semantics and transparent value serialization
//! on top of any [`StorageBackend`](storage::StorageBackend), plus an
//! interceptor that serializes values on the backend's side instead.

pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod serializer;
pub mod storage;

pub use cache::{CacheExt, CacheFacade, SimpleCache};
pub use config::Config;
pub use error::{BackendError, CacheError, Result};
