//! Cache and cache manager trait definitions

use super::errors::CacheResult;
use crate::interceptor::{CacheKey, InvocationError};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Loader handed to [`Cache::get_or_compute`]; called at most once per miss.
pub type ValueLoader<'a> = Box<dyn FnOnce() -> Result<Value, InvocationError> + 'a>;

/// Minimal key-value contract every cache backend implements.
///
/// Values are JSON values. A stored `Value::Null` is a cached null and is
/// reported as `Ok(Some(Value::Null))`; `Ok(None)` always means a miss.
/// Backends that do not allow null values reject them on `put`.
pub trait Cache: Send + Sync + fmt::Debug {
    /// Name of the cache as known to its manager
    fn name(&self) -> &str;

    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Value>>;

    /// Return the cached value, or compute, store and return it.
    ///
    /// Concurrent callers for the same key must not run `loader` more than
    /// once at a time: late callers wait for and observe the first result.
    /// A loader failure is reported as [`CacheError::ValueRetrieval`](super::CacheError::ValueRetrieval)
    /// carrying the original cause, and nothing is stored. A loader must not
    /// call back into the same cache for the same key.
    fn get_or_compute(&self, key: &CacheKey, loader: ValueLoader<'_>) -> CacheResult<Value>;

    /// Store a value, replacing any previous mapping
    fn put(&self, key: &CacheKey, value: Value) -> CacheResult<()>;

    /// Store a value unless one is already present; returns the existing value.
    ///
    /// The default is not atomic; backends with a native primitive override it.
    fn put_if_absent(&self, key: &CacheKey, value: Value) -> CacheResult<Option<Value>> {
        let existing = self.get(key)?;
        if existing.is_none() {
            self.put(key, value)?;
        }
        Ok(existing)
    }

    /// Remove a mapping, possibly deferred or asynchronous
    fn evict(&self, key: &CacheKey) -> CacheResult<()>;

    /// Remove a mapping immediately; `true` if it was present.
    fn evict_if_present(&self, key: &CacheKey) -> CacheResult<bool> {
        self.evict(key)?;
        Ok(false)
    }

    /// Remove all mappings, possibly deferred or asynchronous
    fn clear(&self) -> CacheResult<()>;

    /// Remove all mappings immediately; `true` if any were present.
    fn invalidate(&self) -> CacheResult<bool> {
        self.clear()?;
        Ok(false)
    }

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;
}

/// Lookup of caches by name.
pub trait CacheManager: Send + Sync + fmt::Debug {
    /// The cache registered under `name`, or `None` if this manager has none
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>>;

    /// Names of the caches currently known to this manager
    fn cache_names(&self) -> Vec<String>;
}
