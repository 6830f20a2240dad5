//! Invocation failures and error-handled cache access

use super::error_handler::CacheErrorHandler;
use super::key::CacheKey;
use crate::cache::{Cache, CacheResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Failure of the underlying function.
///
/// Wraps the original cause unchanged so callers can downcast to it.
/// Cheap to clone, so a single failure can be observed by every caller
/// waiting on the same synchronized computation.
#[derive(Clone)]
pub struct InvocationError(Arc<anyhow::Error>);

impl InvocationError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::new(error)))
    }

    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// The original cause
    pub fn original(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Whether two handles share the same underlying failure
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<anyhow::Error> for InvocationError {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Debug for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Cache access that routes backend failures through a [`CacheErrorHandler`].
#[derive(Debug, Clone)]
pub(crate) struct CacheInvoker {
    error_handler: Arc<dyn CacheErrorHandler>,
}

impl CacheInvoker {
    pub(crate) fn new(error_handler: Arc<dyn CacheErrorHandler>) -> Self {
        Self { error_handler }
    }

    /// `get`, with a handled failure reported as a miss
    pub(crate) fn do_get(&self, cache: &dyn Cache, key: &CacheKey) -> CacheResult<Option<Value>> {
        match cache.get(key) {
            Ok(found) => Ok(found),
            Err(error) => {
                self.error_handler.handle_cache_get_error(error, cache, key)?;
                Ok(None)
            }
        }
    }

    pub(crate) fn do_put(&self, cache: &dyn Cache, key: &CacheKey, value: &Value) -> CacheResult<()> {
        if let Err(error) = cache.put(key, value.clone()) {
            self.error_handler
                .handle_cache_put_error(error, cache, key, value)?;
        }
        Ok(())
    }

    /// `evict_if_present` when `immediate`, otherwise `evict`
    pub(crate) fn do_evict(&self, cache: &dyn Cache, key: &CacheKey, immediate: bool) -> CacheResult<()> {
        let outcome = if immediate {
            cache.evict_if_present(key).map(|present| {
                trace!(cache = cache.name(), key = %key, present, "Immediate eviction");
            })
        } else {
            cache.evict(key)
        };
        if let Err(error) = outcome {
            self.error_handler.handle_cache_evict_error(error, cache, key)?;
        }
        Ok(())
    }

    /// `invalidate` when `immediate`, otherwise `clear`
    pub(crate) fn do_clear(&self, cache: &dyn Cache, immediate: bool) -> CacheResult<()> {
        let outcome = if immediate {
            cache.invalidate().map(|had_entries| {
                trace!(cache = cache.name(), had_entries, "Immediate invalidation");
            })
        } else {
            cache.clear()
        };
        if let Err(error) = outcome {
            self.error_handler.handle_cache_clear_error(error, cache)?;
        }
        Ok(())
    }
}
