//! Error types for the cache facade
//!
//! Backends and interceptors fail with [`BackendError`]. The facade only ever
//! surfaces the two kinds of [`CacheError`], wrapping the backend failure that
//! caused them.

use thiserror::Error;

use crate::storage::DataType;

// == Backend Error Enum ==
/// Failure reported by a storage backend or an interceptor wrapping it.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend rejected an argument (key, value or option)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend cannot store values of this type
    #[error("Data type not supported: {0}")]
    UnsupportedType(DataType),

    /// A value could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// An interceptor replaced a result with one of the wrong shape
    #[error("Interceptor produced a mismatched result for {operation}")]
    ResultMismatch { operation: &'static str },

    /// The backend could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BackendError {
    /// Returns true for failures the backend classifies as invalid arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            BackendError::InvalidArgument(_) | BackendError::UnsupportedType(_)
        )
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Codec(err.to_string())
    }
}

// == Cache Error Enum ==
/// Error type exposed by the cache facade.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed key, or a backend failure classified as an invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        #[source]
        source: Option<BackendError>,
    },

    /// Every other backend failure
    #[error("Cache operation failed: {message}")]
    CacheOperation {
        message: String,
        #[source]
        source: BackendError,
    },
}

impl CacheError {
    /// Creates an invalid-argument error raised by the facade itself.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CacheError::InvalidArgument {
            message: message.into(),
            source: None,
        }
    }

    /// Translates a backend failure into the facade taxonomy.
    ///
    /// Invalid-argument failures stay invalid arguments; anything else becomes
    /// a generic operation error. The original failure is kept as the source.
    pub fn from_backend(err: BackendError) -> Self {
        let message = err.to_string();
        if err.is_invalid_argument() {
            CacheError::InvalidArgument {
                message,
                source: Some(err),
            }
        } else {
            CacheError::CacheOperation {
                message,
                source: err,
            }
        }
    }

    /// Returns true for the invalid-argument kind.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CacheError::InvalidArgument { .. })
    }

    /// Returns the backend failure this error wraps, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            CacheError::InvalidArgument { source, .. } => source.as_ref(),
            CacheError::CacheOperation { source, .. } => Some(source),
        }
    }
}

impl From<BackendError> for CacheError {
    fn from(err: BackendError) -> Self {
        CacheError::from_backend(err)
    }
}

// == Result Type Aliases ==
/// Convenience Result type for facade operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type for backend and interceptor operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
