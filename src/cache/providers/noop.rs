//! No-op cache provider
//!
//! Never stores anything. Reads always miss and `get_or_compute` always runs
//! the loader. Used when caching is disabled or a configured backend is not
//! available.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::{Cache, CacheManager, ValueLoader};
use crate::interceptor::CacheKey;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// No-op cache that never caches anything
#[derive(Debug, Clone)]
pub struct NoOpCache {
    name: String,
}

impl NoOpCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Cache for NoOpCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, _key: &CacheKey) -> CacheResult<Option<Value>> {
        Ok(None)
    }

    fn get_or_compute(&self, key: &CacheKey, loader: ValueLoader<'_>) -> CacheResult<Value> {
        loader().map_err(|source| CacheError::ValueRetrieval {
            key: key.clone(),
            source,
        })
    }

    fn put(&self, _key: &CacheKey, _value: Value) -> CacheResult<()> {
        Ok(())
    }

    fn put_if_absent(&self, _key: &CacheKey, _value: Value) -> CacheResult<Option<Value>> {
        Ok(None)
    }

    fn evict(&self, _key: &CacheKey) -> CacheResult<()> {
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}

/// Hands out a [`NoOpCache`] for any name and remembers the names asked for.
#[derive(Debug, Default)]
pub struct NoOpCacheManager {
    caches: DashMap<String, Arc<NoOpCache>>,
}

impl NoOpCacheManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheManager for NoOpCacheManager {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(NoOpCache::new(name)))
            .clone();
        Some(cache)
    }

    fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
