//! Serializer Module
//!
//! Value codecs and the interceptor that applies them transparently to a
//! backend's reads and writes.

mod interceptor;

use std::fmt;

use serde_json::Value;

use crate::error::{BackendError, BackendResult};
use crate::storage::DataType;

pub use interceptor::SerializerInterceptor;

// == Codec ==
/// Turns arbitrary values into an opaque form any backend can store, and back.
pub trait Codec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Encodes a value into its stored form.
    fn encode(&self, value: &Value) -> BackendResult<Value>;

    /// Decodes a stored form back into the original value.
    fn decode(&self, encoded: &Value) -> BackendResult<Value>;
}

// == JSON Codec ==
/// Stores values as JSON text inside a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> BackendResult<Value> {
        Ok(Value::String(serde_json::to_string(value)?))
    }

    fn decode(&self, encoded: &Value) -> BackendResult<Value> {
        match encoded {
            Value::String(text) => Ok(serde_json::from_str(text)?),
            other => Err(BackendError::Codec(format!(
                "expected an encoded string, found {}",
                DataType::of(other)
            ))),
        }
    }
}
