//! Handling of cache backend failures
//!
//! Each backend call made by the executor is wrapped: a failing `get` is
//! handed to the error handler and, if the handler swallows it, treated as a
//! miss. Failing writes and evictions are skipped the same way. Returning the
//! error from a hook aborts the intercepted call with that error.

use crate::cache::{Cache, CacheError, CacheResult};
use crate::interceptor::CacheKey;
use serde_json::Value;
use std::fmt;
use tracing::warn;

pub trait CacheErrorHandler: Send + Sync + fmt::Debug {
    fn handle_cache_get_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &CacheKey,
    ) -> CacheResult<()>;

    fn handle_cache_put_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &CacheKey,
        value: &Value,
    ) -> CacheResult<()>;

    fn handle_cache_evict_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &CacheKey,
    ) -> CacheResult<()>;

    fn handle_cache_clear_error(&self, error: CacheError, cache: &dyn Cache) -> CacheResult<()>;
}

/// Rethrows every error. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCacheErrorHandler;

impl CacheErrorHandler for SimpleCacheErrorHandler {
    fn handle_cache_get_error(
        &self,
        error: CacheError,
        _cache: &dyn Cache,
        _key: &CacheKey,
    ) -> CacheResult<()> {
        Err(error)
    }

    fn handle_cache_put_error(
        &self,
        error: CacheError,
        _cache: &dyn Cache,
        _key: &CacheKey,
        _value: &Value,
    ) -> CacheResult<()> {
        Err(error)
    }

    fn handle_cache_evict_error(
        &self,
        error: CacheError,
        _cache: &dyn Cache,
        _key: &CacheKey,
    ) -> CacheResult<()> {
        Err(error)
    }

    fn handle_cache_clear_error(&self, error: CacheError, _cache: &dyn Cache) -> CacheResult<()> {
        Err(error)
    }
}

/// Logs every error at `warn` and carries on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCacheErrorHandler;

impl CacheErrorHandler for LoggingCacheErrorHandler {
    fn handle_cache_get_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &CacheKey,
    ) -> CacheResult<()> {
        warn!(
            cache = cache.name(),
            key = %key,
            error = %error,
            "Cache get failed, treating as miss"
        );
        Ok(())
    }

    fn handle_cache_put_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &CacheKey,
        _value: &Value,
    ) -> CacheResult<()> {
        warn!(
            cache = cache.name(),
            key = %key,
            error = %error,
            "Cache put failed, value not stored"
        );
        Ok(())
    }

    fn handle_cache_evict_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &CacheKey,
    ) -> CacheResult<()> {
        warn!(
            cache = cache.name(),
            key = %key,
            error = %error,
            "Cache evict failed"
        );
        Ok(())
    }

    fn handle_cache_clear_error(&self, error: CacheError, cache: &dyn Cache) -> CacheResult<()> {
        warn!(cache = cache.name(), error = %error, "Cache clear failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoOpCache;

    #[test]
    fn test_simple_handler_rethrows() {
        let cache = NoOpCache::new("users");
        let err = SimpleCacheErrorHandler
            .handle_cache_get_error(
                CacheError::backend("users", "connection reset"),
                &cache,
                &CacheKey::from("k"),
            )
            .unwrap_err();
        assert!(matches!(err, CacheError::BackendError { .. }));
    }

    #[test]
    fn test_logging_handler_swallows() {
        let cache = NoOpCache::new("users");
        let handler = LoggingCacheErrorHandler;
        assert!(handler
            .handle_cache_put_error(
                CacheError::backend("users", "full"),
                &cache,
                &CacheKey::from("k"),
                &Value::Null,
            )
            .is_ok());
        assert!(handler
            .handle_cache_clear_error(CacheError::backend("users", "down"), &cache)
            .is_ok());
    }
}
