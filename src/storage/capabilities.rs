//! Capability Descriptor Module
//!
//! Describes which value types a backend can hold and its key/TTL limits.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::storage::BackendId;

// == Data Type ==
/// Kinds of values an application may cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl DataType {
    /// Every data type, in declaration order.
    pub const ALL: [DataType; 7] = [
        DataType::Null,
        DataType::Boolean,
        DataType::Integer,
        DataType::Float,
        DataType::String,
        DataType::Array,
        DataType::Object,
    ];

    /// Classifies a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Number(n) if n.is_f64() => DataType::Float,
            Value::Number(_) => DataType::Integer,
            Value::String(_) => DataType::String,
            Value::Array(_) => DataType::Array,
            Value::Object(_) => DataType::Object,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "null",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Array => "array",
            DataType::Object => "object",
        };
        f.write_str(name)
    }
}

// == Type Support ==
/// How a backend handles one data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSupport {
    /// Stored and returned unchanged
    Native,
    /// Stored after conversion; reads return the converted type
    Converted(DataType),
    /// Rejected on write
    Unsupported,
}

// == Capabilities ==
/// Immutable description of a backend.
///
/// A descriptor may carry a base descriptor; any limit it does not set itself
/// is looked up on the base. Supported types are always set explicitly.
#[derive(Debug, Clone)]
pub struct Capabilities {
    backend: BackendId,
    supported_types: BTreeMap<DataType, TypeSupport>,
    max_key_length: Option<usize>,
    min_ttl: Option<u64>,
    max_ttl: Option<u64>,
    static_ttl: Option<bool>,
    base: Option<Arc<Capabilities>>,
}

impl Capabilities {
    /// Starts a descriptor for the given backend.
    pub fn builder(backend: BackendId) -> CapabilitiesBuilder {
        CapabilitiesBuilder {
            inner: Capabilities {
                backend,
                supported_types: BTreeMap::new(),
                max_key_length: None,
                min_ttl: None,
                max_ttl: None,
                static_ttl: None,
                base: None,
            },
        }
    }

    /// Backend this descriptor describes.
    pub fn backend(&self) -> BackendId {
        self.backend
    }

    /// Support level for a data type; types never declared are unsupported.
    pub fn support_for(&self, data_type: DataType) -> TypeSupport {
        self.supported_types
            .get(&data_type)
            .copied()
            .unwrap_or(TypeSupport::Unsupported)
    }

    /// Full supported-type table.
    pub fn supported_types(&self) -> &BTreeMap<DataType, TypeSupport> {
        &self.supported_types
    }

    /// Returns true when every data type is stored natively.
    pub fn supports_all_natively(&self) -> bool {
        DataType::ALL
            .iter()
            .all(|t| self.support_for(*t) == TypeSupport::Native)
    }

    /// Maximum key length in characters, if limited.
    pub fn max_key_length(&self) -> Option<usize> {
        self.max_key_length
            .or_else(|| self.base.as_ref().and_then(|b| b.max_key_length()))
    }

    /// Smallest accepted TTL in seconds, if limited.
    pub fn min_ttl(&self) -> Option<u64> {
        self.min_ttl
            .or_else(|| self.base.as_ref().and_then(|b| b.min_ttl()))
    }

    /// Largest accepted TTL in seconds, if limited.
    pub fn max_ttl(&self) -> Option<u64> {
        self.max_ttl
            .or_else(|| self.base.as_ref().and_then(|b| b.max_ttl()))
    }

    /// Whether the TTL is fixed at write time (true) or refreshed on read.
    pub fn static_ttl(&self) -> bool {
        self.static_ttl
            .or_else(|| self.base.as_ref().map(|b| b.static_ttl()))
            .unwrap_or(true)
    }

    /// Descriptor this one was derived from.
    pub fn base(&self) -> Option<&Arc<Capabilities>> {
        self.base.as_ref()
    }
}

// == Capabilities Builder ==
/// Builder for [`Capabilities`].
#[derive(Debug)]
pub struct CapabilitiesBuilder {
    inner: Capabilities,
}

impl CapabilitiesBuilder {
    /// Declares support for one data type.
    pub fn support(mut self, data_type: DataType, support: TypeSupport) -> Self {
        self.inner.supported_types.insert(data_type, support);
        self
    }

    /// Declares native support for every data type.
    pub fn all_native(mut self) -> Self {
        for t in DataType::ALL {
            self.inner.supported_types.insert(t, TypeSupport::Native);
        }
        self
    }

    pub fn max_key_length(mut self, length: usize) -> Self {
        self.inner.max_key_length = Some(length);
        self
    }

    pub fn min_ttl(mut self, ttl: u64) -> Self {
        self.inner.min_ttl = Some(ttl);
        self
    }

    pub fn max_ttl(mut self, ttl: u64) -> Self {
        self.inner.max_ttl = Some(ttl);
        self
    }

    pub fn static_ttl(mut self, static_ttl: bool) -> Self {
        self.inner.static_ttl = Some(static_ttl);
        self
    }

    /// Falls back to `base` for every limit not set on this builder.
    pub fn base(mut self, base: Arc<Capabilities>) -> Self {
        self.inner.base = Some(base);
        self
    }

    pub fn build(self) -> Capabilities {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_type_of() {
        assert_eq!(DataType::of(&json!(null)), DataType::Null);
        assert_eq!(DataType::of(&json!(false)), DataType::Boolean);
        assert_eq!(DataType::of(&json!(42)), DataType::Integer);
        assert_eq!(DataType::of(&json!(-7)), DataType::Integer);
        assert_eq!(DataType::of(&json!(1.5)), DataType::Float);
        assert_eq!(DataType::of(&json!("x")), DataType::String);
        assert_eq!(DataType::of(&json!([1, 2])), DataType::Array);
        assert_eq!(DataType::of(&json!({"a": 1})), DataType::Object);
    }

    #[test]
    fn test_undeclared_type_is_unsupported() {
        let caps = Capabilities::builder(BackendId::new())
            .support(DataType::String, TypeSupport::Native)
            .build();
        assert_eq!(caps.support_for(DataType::String), TypeSupport::Native);
        assert_eq!(caps.support_for(DataType::Array), TypeSupport::Unsupported);
        assert!(!caps.supports_all_natively());
    }

    #[test]
    fn test_all_native() {
        let caps = Capabilities::builder(BackendId::new()).all_native().build();
        assert!(caps.supports_all_natively());
    }

    #[test]
    fn test_limits_fall_back_to_base() {
        let id = BackendId::new();
        let base = Arc::new(
            Capabilities::builder(id)
                .max_key_length(250)
                .max_ttl(3600)
                .static_ttl(false)
                .build(),
        );
        let derived = Capabilities::builder(id)
            .all_native()
            .max_ttl(60)
            .base(base.clone())
            .build();

        assert_eq!(derived.max_key_length(), Some(250));
        assert_eq!(derived.max_ttl(), Some(60));
        assert_eq!(derived.min_ttl(), None);
        assert!(!derived.static_ttl());
        assert!(Arc::ptr_eq(derived.base().unwrap(), &base));
    }
}
