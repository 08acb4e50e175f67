//! Hooks Module
//!
//! An explicit, ordered interceptor chain wrapped around backend operations.
//!
//! Every backend call becomes a [`HookEvent`]. Interceptors see it twice: in
//! the pre phase they may rewrite the parameters (or fill the result to skip
//! the backend entirely), in the post phase they may rewrite the result.
//! Pre hooks run by descending priority, post hooks by ascending priority, so
//! the interceptor that wraps first on the way in unwraps last on the way out.

mod intercepted;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::error::{BackendError, BackendResult};
use crate::storage::{BackendId, Capabilities, ValueMap};

pub use intercepted::InterceptedBackend;

// == Operation ==
/// Backend operations that dispatch hook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetItem,
    GetItems,
    HasItem,
    SetItem,
    SetItems,
    AddItem,
    AddItems,
    ReplaceItem,
    ReplaceItems,
    CheckAndSetItem,
    RemoveItem,
    RemoveItems,
    Flush,
    GetCapabilities,
}

impl Operation {
    /// Event name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetItem => "getItem",
            Operation::GetItems => "getItems",
            Operation::HasItem => "hasItem",
            Operation::SetItem => "setItem",
            Operation::SetItems => "setItems",
            Operation::AddItem => "addItem",
            Operation::AddItems => "addItems",
            Operation::ReplaceItem => "replaceItem",
            Operation::ReplaceItems => "replaceItems",
            Operation::CheckAndSetItem => "checkAndSetItem",
            Operation::RemoveItem => "removeItem",
            Operation::RemoveItems => "removeItems",
            Operation::Flush => "flush",
            Operation::GetCapabilities => "getCapabilities",
        }
    }

    /// Writes carrying a single `value`.
    pub fn is_single_write(&self) -> bool {
        matches!(
            self,
            Operation::SetItem
                | Operation::AddItem
                | Operation::ReplaceItem
                | Operation::CheckAndSetItem
        )
    }

    /// Writes carrying `key_value_pairs`.
    pub fn is_batch_write(&self) -> bool {
        matches!(
            self,
            Operation::SetItems | Operation::AddItems | Operation::ReplaceItems
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// == Params ==
/// Mutable parameter bag of one backend call.
///
/// Only the fields relevant to the operation are populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub key: Option<String>,
    pub keys: Vec<String>,
    pub value: Option<Value>,
    /// Comparison value of a check-and-set write
    pub token: Option<Value>,
    pub key_value_pairs: ValueMap,
    /// Per-call TTL in seconds, None = never expire
    pub ttl: Option<u64>,
}

impl Params {
    fn require_key(&self, operation: Operation) -> BackendResult<&str> {
        self.key.as_deref().ok_or_else(|| {
            BackendError::InvalidArgument(format!("{} requires a key", operation))
        })
    }
}

// == Outcome ==
/// Result slot of a hook event.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Single read; None is a miss
    Item(Option<Value>),
    /// Batch read; found keys only
    Items(ValueMap),
    /// Boolean success of a single write, remove, exists check or flush
    Flag(bool),
    /// Keys a batch operation failed on
    Keys(Vec<String>),
    Capabilities(Arc<Capabilities>),
}

impl Outcome {
    pub fn into_item(self, operation: Operation) -> BackendResult<Option<Value>> {
        match self {
            Outcome::Item(value) => Ok(value),
            _ => Err(mismatch(operation)),
        }
    }

    pub fn into_items(self, operation: Operation) -> BackendResult<ValueMap> {
        match self {
            Outcome::Items(items) => Ok(items),
            _ => Err(mismatch(operation)),
        }
    }

    pub fn into_flag(self, operation: Operation) -> BackendResult<bool> {
        match self {
            Outcome::Flag(flag) => Ok(flag),
            _ => Err(mismatch(operation)),
        }
    }

    pub fn into_keys(self, operation: Operation) -> BackendResult<Vec<String>> {
        match self {
            Outcome::Keys(keys) => Ok(keys),
            _ => Err(mismatch(operation)),
        }
    }

    pub fn into_capabilities(self, operation: Operation) -> BackendResult<Arc<Capabilities>> {
        match self {
            Outcome::Capabilities(caps) => Ok(caps),
            _ => Err(mismatch(operation)),
        }
    }
}

fn mismatch(operation: Operation) -> BackendError {
    BackendError::ResultMismatch {
        operation: operation.name(),
    }
}

// == Hook Event ==
/// One backend call as seen by interceptors.
#[derive(Debug, Clone)]
pub struct HookEvent {
    operation: Operation,
    backend: BackendId,
    /// Parameters; rewriting them in the pre phase changes what the backend receives
    pub params: Params,
    /// Result; empty during the pre phase unless an interceptor short-circuits
    pub result: Option<Outcome>,
}

impl HookEvent {
    pub fn new(operation: Operation, backend: BackendId) -> Self {
        Self {
            operation,
            backend,
            params: Params::default(),
            result: None,
        }
    }

    pub fn with_params(operation: Operation, backend: BackendId, params: Params) -> Self {
        Self {
            operation,
            backend,
            params,
            result: None,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Backend the call is made against.
    pub fn backend(&self) -> BackendId {
        self.backend
    }
}

// == Interceptor ==
/// A pre/post transform around backend operations.
pub trait Interceptor: Send + Sync {
    /// Name used to detach the interceptor.
    fn name(&self) -> &str;

    /// Called before the backend executes.
    fn pre(&self, _event: &mut HookEvent) -> BackendResult<()> {
        Ok(())
    }

    /// Called after the backend executed, before the caller sees the result.
    fn post(&self, _event: &mut HookEvent) -> BackendResult<()> {
        Ok(())
    }

    /// Called when the interceptor stops wrapping `backend`.
    fn on_detach(&self, _backend: BackendId) {}
}

// == Interceptor Chain ==
#[derive(Clone)]
struct Registration {
    interceptor: Arc<dyn Interceptor>,
    priority: i32,
    seq: u64,
}

/// Interceptors ordered by priority.
///
/// Equal priorities keep attach order in both phases.
#[derive(Default, Clone)]
pub struct InterceptorChain {
    /// Descending priority
    pre: Vec<Registration>,
    /// Ascending priority
    post: Vec<Registration>,
    next_seq: u64,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interceptor with the given priority.
    pub fn attach(&mut self, interceptor: Arc<dyn Interceptor>, priority: i32) {
        let registration = Registration {
            interceptor,
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.pre.push(registration.clone());
        self.pre.sort_by_key(|r| (-i64::from(r.priority), r.seq));

        self.post.push(registration);
        self.post.sort_by_key(|r| (r.priority, r.seq));
    }

    /// Removes every interceptor registered under `name`.
    ///
    /// Returns the removed interceptors, one per distinct instance.
    pub fn detach(&mut self, name: &str) -> Vec<Arc<dyn Interceptor>> {
        let mut removed: Vec<Arc<dyn Interceptor>> = Vec::new();
        for registration in self.pre.iter().filter(|r| r.interceptor.name() == name) {
            if !removed.iter().any(|i| Arc::ptr_eq(i, &registration.interceptor)) {
                removed.push(Arc::clone(&registration.interceptor));
            }
        }
        self.pre.retain(|r| r.interceptor.name() != name);
        self.post.retain(|r| r.interceptor.name() != name);
        removed
    }

    pub fn len(&self) -> usize {
        self.pre.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty()
    }

    /// Distinct interceptors in attach order.
    pub fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        let mut by_seq: Vec<&Registration> = self.pre.iter().collect();
        by_seq.sort_by_key(|r| r.seq);
        let mut distinct: Vec<Arc<dyn Interceptor>> = Vec::new();
        for registration in by_seq {
            if !distinct.iter().any(|i| Arc::ptr_eq(i, &registration.interceptor)) {
                distinct.push(Arc::clone(&registration.interceptor));
            }
        }
        distinct
    }

    /// Runs the pre phase, stopping at the first failing interceptor.
    pub fn run_pre(&self, event: &mut HookEvent) -> BackendResult<()> {
        for registration in &self.pre {
            trace!(
                interceptor = registration.interceptor.name(),
                event = %event.operation(),
                priority = registration.priority,
                "pre"
            );
            registration.interceptor.pre(event)?;
        }
        Ok(())
    }

    /// Runs the post phase, stopping at the first failing interceptor.
    pub fn run_post(&self, event: &mut HookEvent) -> BackendResult<()> {
        for registration in &self.post {
            trace!(
                interceptor = registration.interceptor.name(),
                event = %event.operation(),
                priority = registration.priority,
                "post"
            );
            registration.interceptor.post(event)?;
        }
        Ok(())
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.pre
                    .iter()
                    .map(|r| (r.interceptor.name().to_string(), r.priority)),
            )
            .finish()
    }
}
