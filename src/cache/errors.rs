//! Cache error types

use crate::interceptor::{CacheKey, InvocationError};
use thiserror::Error;

/// Errors that can occur during cache backend operations
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Generic backend failure (I/O, connection, internal state)
    #[error("Cache backend error in '{cache}': {reason}")]
    BackendError { cache: String, reason: String },

    /// The cache refuses to store null values
    #[error("Cache '{cache}' is configured to not allow null values but null was provided")]
    NullValueNotAllowed { cache: String },

    /// The value loader of `get_or_compute` failed; carries the original cause
    #[error("Value for key '{key}' could not be loaded: {source}")]
    ValueRetrieval {
        key: CacheKey,
        #[source]
        source: InvocationError,
    },
}

impl CacheError {
    pub fn backend(cache: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendError {
            cache: cache.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
