//! Intercepted Backend
//!
//! Wraps a backend so every operation runs through an [`InterceptorChain`].

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::error::{BackendError, BackendResult};
use crate::hooks::{HookEvent, Interceptor, InterceptorChain, Operation, Outcome, Params};
use crate::storage::{
    BackendId, BackendOptions, Capabilities, Flushable, StorageBackend, ValueMap,
};

/// A backend whose operations are wrapped by interceptors.
///
/// It reports the inner backend's identity and options, and is flushable
/// exactly when the inner backend is.
pub struct InterceptedBackend<B: StorageBackend> {
    inner: B,
    chain: InterceptorChain,
}

impl<B: StorageBackend> InterceptedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            chain: InterceptorChain::new(),
        }
    }

    /// Attaches an interceptor, builder style.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>, priority: i32) -> Self {
        self.attach(interceptor, priority);
        self
    }

    pub fn attach(&mut self, interceptor: Arc<dyn Interceptor>, priority: i32) {
        self.chain.attach(interceptor, priority);
    }

    /// Detaches interceptors by name. Returns whether anything was removed.
    pub fn detach(&mut self, name: &str) -> bool {
        let removed = self.chain.detach(name);
        let id = self.inner.id();
        for interceptor in &removed {
            interceptor.on_detach(id);
        }
        !removed.is_empty()
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    // == Dispatch ==
    /// Runs pre hooks, the backend call (unless a pre hook already produced a
    /// result), then post hooks.
    fn dispatch<F>(&self, operation: Operation, params: Params, call: F) -> BackendResult<Outcome>
    where
        F: FnOnce(&B, &mut Params) -> BackendResult<Outcome>,
    {
        let mut event = HookEvent::with_params(operation, self.inner.id(), params);
        self.chain.run_pre(&mut event)?;

        if event.result.is_none() {
            let outcome = call(&self.inner, &mut event.params)?;
            event.result = Some(outcome);
        } else {
            trace!(event = %operation, "backend call short-circuited by interceptor");
        }

        self.chain.run_post(&mut event)?;
        event.result.ok_or(BackendError::ResultMismatch {
            operation: operation.name(),
        })
    }

    fn single_write<F>(
        &self,
        operation: Operation,
        key: &str,
        value: Value,
        ttl: Option<u64>,
        write: F,
    ) -> BackendResult<bool>
    where
        F: FnOnce(&B, &str, Value, Option<u64>) -> BackendResult<bool>,
    {
        let params = Params {
            key: Some(key.to_string()),
            value: Some(value),
            ttl,
            ..Params::default()
        };
        self.dispatch(operation, params, |inner, params| {
            let value = params.value.take().unwrap_or(Value::Null);
            let key = params.require_key(operation)?;
            Ok(Outcome::Flag(write(inner, key, value, params.ttl)?))
        })?
        .into_flag(operation)
    }

    fn batch_write<F>(
        &self,
        operation: Operation,
        items: ValueMap,
        ttl: Option<u64>,
        write: F,
    ) -> BackendResult<Vec<String>>
    where
        F: FnOnce(&B, ValueMap, Option<u64>) -> BackendResult<Vec<String>>,
    {
        let params = Params {
            key_value_pairs: items,
            ttl,
            ..Params::default()
        };
        self.dispatch(operation, params, |inner, params| {
            let items = std::mem::take(&mut params.key_value_pairs);
            Ok(Outcome::Keys(write(inner, items, params.ttl)?))
        })?
        .into_keys(operation)
    }

    fn key_params(key: &str) -> Params {
        Params {
            key: Some(key.to_string()),
            ..Params::default()
        }
    }

    fn keys_params(keys: &[String]) -> Params {
        Params {
            keys: keys.to_vec(),
            ..Params::default()
        }
    }
}

impl<B: StorageBackend> StorageBackend for InterceptedBackend<B> {
    fn id(&self) -> BackendId {
        self.inner.id()
    }

    fn options(&self) -> BackendOptions {
        self.inner.options()
    }

    fn set_options(&self, options: BackendOptions) {
        self.inner.set_options(options);
    }

    fn get_item(&self, key: &str) -> BackendResult<Option<Value>> {
        let op = Operation::GetItem;
        self.dispatch(op, Self::key_params(key), |inner, params| {
            Ok(Outcome::Item(inner.get_item(params.require_key(op)?)?))
        })?
        .into_item(op)
    }

    fn get_items(&self, keys: &[String]) -> BackendResult<ValueMap> {
        let op = Operation::GetItems;
        self.dispatch(op, Self::keys_params(keys), |inner, params| {
            Ok(Outcome::Items(inner.get_items(&params.keys)?))
        })?
        .into_items(op)
    }

    fn has_item(&self, key: &str) -> BackendResult<bool> {
        let op = Operation::HasItem;
        self.dispatch(op, Self::key_params(key), |inner, params| {
            Ok(Outcome::Flag(inner.has_item(params.require_key(op)?)?))
        })?
        .into_flag(op)
    }

    fn set_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool> {
        self.single_write(Operation::SetItem, key, value, ttl, |inner, k, v, t| {
            inner.set_item(k, v, t)
        })
    }

    fn set_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>> {
        self.batch_write(Operation::SetItems, items, ttl, |inner, i, t| {
            inner.set_items(i, t)
        })
    }

    fn add_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool> {
        self.single_write(Operation::AddItem, key, value, ttl, |inner, k, v, t| {
            inner.add_item(k, v, t)
        })
    }

    fn add_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>> {
        self.batch_write(Operation::AddItems, items, ttl, |inner, i, t| {
            inner.add_items(i, t)
        })
    }

    fn replace_item(&self, key: &str, value: Value, ttl: Option<u64>) -> BackendResult<bool> {
        self.single_write(Operation::ReplaceItem, key, value, ttl, |inner, k, v, t| {
            inner.replace_item(k, v, t)
        })
    }

    fn replace_items(&self, items: ValueMap, ttl: Option<u64>) -> BackendResult<Vec<String>> {
        self.batch_write(Operation::ReplaceItems, items, ttl, |inner, i, t| {
            inner.replace_items(i, t)
        })
    }

    fn check_and_set_item(
        &self,
        token: &Value,
        key: &str,
        value: Value,
        ttl: Option<u64>,
    ) -> BackendResult<bool> {
        let op = Operation::CheckAndSetItem;
        let params = Params {
            key: Some(key.to_string()),
            value: Some(value),
            token: Some(token.clone()),
            ttl,
            ..Params::default()
        };
        self.dispatch(op, params, |inner, params| {
            let value = params.value.take().unwrap_or(Value::Null);
            let token = params.token.take().unwrap_or(Value::Null);
            let key = params.require_key(op)?;
            Ok(Outcome::Flag(
                inner.check_and_set_item(&token, key, value, params.ttl)?,
            ))
        })?
        .into_flag(op)
    }

    fn remove_item(&self, key: &str) -> BackendResult<bool> {
        let op = Operation::RemoveItem;
        self.dispatch(op, Self::key_params(key), |inner, params| {
            Ok(Outcome::Flag(inner.remove_item(params.require_key(op)?)?))
        })?
        .into_flag(op)
    }

    fn remove_items(&self, keys: &[String]) -> BackendResult<Vec<String>> {
        let op = Operation::RemoveItems;
        self.dispatch(op, Self::keys_params(keys), |inner, params| {
            Ok(Outcome::Keys(inner.remove_items(&params.keys)?))
        })?
        .into_keys(op)
    }

    fn capabilities(&self) -> BackendResult<Arc<Capabilities>> {
        let op = Operation::GetCapabilities;
        self.dispatch(op, Params::default(), |inner, _| {
            Ok(Outcome::Capabilities(inner.capabilities()?))
        })?
        .into_capabilities(op)
    }

    fn flushable(&self) -> Option<&dyn Flushable> {
        self.inner.flushable().map(|_| self as &dyn Flushable)
    }
}

impl<B: StorageBackend> Flushable for InterceptedBackend<B> {
    fn flush(&self) -> BackendResult<bool> {
        let op = Operation::Flush;
        self.dispatch(op, Params::default(), |inner, _| {
            let flushed = match inner.flushable() {
                Some(flushable) => flushable.flush()?,
                None => false,
            };
            Ok(Outcome::Flag(flushed))
        })?
        .into_flag(op)
    }
}

impl<B: StorageBackend> Drop for InterceptedBackend<B> {
    fn drop(&mut self) {
        let id = self.inner.id();
        for interceptor in self.chain.interceptors() {
            interceptor.on_detach(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Prefixes string values on write and records detach notifications.
    struct Prefixer {
        detached: Mutex<Vec<BackendId>>,
    }

    impl Interceptor for Prefixer {
        fn name(&self) -> &str {
            "prefixer"
        }

        fn pre(&self, event: &mut HookEvent) -> BackendResult<()> {
            if event.operation().is_single_write() {
                if let Some(Value::String(s)) = event.params.value.as_mut() {
                    s.insert_str(0, "p:");
                }
            }
            Ok(())
        }

        fn on_detach(&self, backend: BackendId) {
            self.detached.lock().push(backend);
        }
    }

    /// Answers every read from its own table without touching the backend.
    struct ShortCircuit;

    impl Interceptor for ShortCircuit {
        fn name(&self) -> &str {
            "short-circuit"
        }

        fn pre(&self, event: &mut HookEvent) -> BackendResult<()> {
            if event.operation() == Operation::GetItem {
                event.result = Some(Outcome::Item(Some(json!("from-hook"))));
            }
            Ok(())
        }
    }

    /// Breaks the result contract.
    struct WrongShape;

    impl Interceptor for WrongShape {
        fn name(&self) -> &str {
            "wrong-shape"
        }

        fn post(&self, event: &mut HookEvent) -> BackendResult<()> {
            event.result = Some(Outcome::Flag(true));
            Ok(())
        }
    }

    fn prefixer() -> Arc<Prefixer> {
        Arc::new(Prefixer {
            detached: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_pre_hook_rewrites_params() {
        let backend = InterceptedBackend::new(MemoryBackend::new()).with_interceptor(prefixer(), 1);

        backend.set_item("k", json!("v"), None).unwrap();
        assert_eq!(backend.inner().get_item("k").unwrap(), Some(json!("p:v")));
        assert_eq!(backend.get_item("k").unwrap(), Some(json!("p:v")));
    }

    #[test]
    fn test_short_circuit_skips_backend() {
        let backend =
            InterceptedBackend::new(MemoryBackend::new()).with_interceptor(Arc::new(ShortCircuit), 1);

        assert_eq!(backend.get_item("absent").unwrap(), Some(json!("from-hook")));
        assert!(backend.inner().is_empty());
    }

    #[test]
    fn test_mismatched_result_is_an_error() {
        let backend =
            InterceptedBackend::new(MemoryBackend::new()).with_interceptor(Arc::new(WrongShape), 1);

        let result = backend.get_item("k");
        assert!(matches!(
            result,
            Err(BackendError::ResultMismatch { operation: "getItem" })
        ));
    }

    #[test]
    fn test_identity_and_options_pass_through() {
        let backend = InterceptedBackend::new(MemoryBackend::new());
        assert_eq!(backend.id(), backend.inner().id());

        backend.set_options(BackendOptions { ttl: 12 });
        assert_eq!(backend.inner().options().ttl, 12);
    }

    #[test]
    fn test_flush_passes_through_chain() {
        let backend = InterceptedBackend::new(MemoryBackend::new()).with_interceptor(prefixer(), 1);
        backend.set_item("a", json!("x"), None).unwrap();

        let flushable = backend.flushable().expect("inner backend is flushable");
        assert!(flushable.flush().unwrap());
        assert!(backend.inner().is_empty());
    }

    #[test]
    fn test_detach_notifies_interceptor() {
        let hook = prefixer();
        let mut backend = InterceptedBackend::new(MemoryBackend::new());
        backend.attach(hook.clone(), 1);
        let id = backend.id();

        assert!(backend.detach("prefixer"));
        assert!(!backend.detach("prefixer"));
        assert_eq!(*hook.detached.lock(), vec![id]);

        backend.set_item("k", json!("v"), None).unwrap();
        assert_eq!(backend.get_item("k").unwrap(), Some(json!("v")));
    }

    #[test]
    fn test_drop_notifies_interceptor() {
        let hook = prefixer();
        let backend = InterceptedBackend::new(MemoryBackend::new()).with_interceptor(hook.clone(), 1);
        let id = backend.id();

        drop(backend);
        assert_eq!(*hook.detached.lock(), vec![id]);
    }
}
