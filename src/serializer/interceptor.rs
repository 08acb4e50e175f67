//! Serializer Interceptor
//!
//! Encodes values before they reach the backend and decodes them on the way
//! back. Because encoded values are plain strings, the interceptor also
//! rewrites the backend's capability descriptor to claim every data type.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::BackendResult;
use crate::hooks::{HookEvent, InterceptedBackend, Interceptor, Operation, Outcome};
use crate::serializer::{Codec, JsonCodec};
use crate::storage::{BackendId, Capabilities, StorageBackend};

/// Interceptor applying a [`Codec`] to backend reads and writes.
///
/// One augmented capability descriptor is kept per backend and handed out on
/// every later query, until the interceptor is detached from that backend.
#[derive(Debug)]
pub struct SerializerInterceptor {
    codec: Arc<dyn Codec>,
    capabilities: Mutex<HashMap<BackendId, Arc<Capabilities>>>,
}

impl SerializerInterceptor {
    pub const NAME: &'static str = "serializer";

    /// Priority used when none is configured.
    pub const DEFAULT_PRIORITY: i32 = 1;

    /// Creates an interceptor using the JSON codec.
    pub fn new() -> Self {
        Self::with_codec(Arc::new(JsonCodec))
    }

    pub fn with_codec(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            capabilities: Mutex::new(HashMap::new()),
        }
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Wraps `backend` with this interceptor at the given priority.
    pub fn wrap<B: StorageBackend>(self: Arc<Self>, backend: B, priority: i32) -> InterceptedBackend<B> {
        InterceptedBackend::new(backend).with_interceptor(self, priority)
    }

    /// Wraps `backend` with a JSON serializer at the configured priority.
    pub fn wrap_from_config<B: StorageBackend>(backend: B, config: &Config) -> InterceptedBackend<B> {
        Arc::new(Self::new()).wrap(backend, config.serializer_priority)
    }

    /// Number of backends with a cached descriptor.
    pub fn cached_descriptors(&self) -> usize {
        self.capabilities.lock().len()
    }

    // == Event Handlers ==
    fn on_write_item_pre(&self, event: &mut HookEvent) -> BackendResult<()> {
        if let Some(value) = event.params.value.as_mut() {
            *value = self.codec.encode(value)?;
        }
        // Check-and-set compares against the stored form, so the token is
        // encoded the same way.
        if let Some(token) = event.params.token.as_mut() {
            *token = self.codec.encode(token)?;
        }
        Ok(())
    }

    fn on_write_items_pre(&self, event: &mut HookEvent) -> BackendResult<()> {
        for value in event.params.key_value_pairs.values_mut() {
            *value = self.codec.encode(value)?;
        }
        Ok(())
    }

    fn on_read_item_post(&self, event: &mut HookEvent) -> BackendResult<()> {
        if let Some(Outcome::Item(Some(raw))) = event.result.as_mut() {
            if !raw.is_null() {
                *raw = self.codec.decode(raw)?;
            }
        }
        Ok(())
    }

    fn on_read_items_post(&self, event: &mut HookEvent) -> BackendResult<()> {
        if let Some(Outcome::Items(items)) = event.result.as_mut() {
            for value in items.values_mut() {
                *value = self.codec.decode(value)?;
            }
        }
        Ok(())
    }

    /// Cached per dispatching backend, the same id `on_detach` receives.
    fn on_get_capabilities_post(&self, event: &mut HookEvent) {
        let backend = event.backend();
        let Some(Outcome::Capabilities(base)) = event.result.as_ref() else {
            return;
        };

        let augmented = {
            let mut cache = self.capabilities.lock();
            let entry = cache.entry(backend).or_insert_with(|| {
                debug!(backend = %backend, codec = self.codec.name(), "augmenting capabilities");
                Arc::new(
                    Capabilities::builder(backend)
                        .all_native()
                        .base(Arc::clone(base))
                        .build(),
                )
            });
            Arc::clone(entry)
        };

        event.result = Some(Outcome::Capabilities(augmented));
    }
}

impl Default for SerializerInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for SerializerInterceptor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn pre(&self, event: &mut HookEvent) -> BackendResult<()> {
        let operation = event.operation();
        if operation.is_single_write() {
            self.on_write_item_pre(event)
        } else if operation.is_batch_write() {
            self.on_write_items_pre(event)
        } else {
            Ok(())
        }
    }

    fn post(&self, event: &mut HookEvent) -> BackendResult<()> {
        match event.operation() {
            Operation::GetItem => self.on_read_item_post(event),
            Operation::GetItems => self.on_read_items_post(event),
            Operation::GetCapabilities => {
                self.on_get_capabilities_post(event);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_detach(&self, backend: BackendId) {
        if self.capabilities.lock().remove(&backend).is_some() {
            debug!(backend = %backend, "dropped cached capabilities");
        }
    }
}
