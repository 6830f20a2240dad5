//! In-memory cache provider using Moka
//!
//! Bounded, optionally expiring in-process cache. Moka's `try_get_with`
//! coalesces concurrent loads of the same key, which gives synchronized
//! cacheable operations single-flight semantics without extra locking.
//!
//! **Important**: This cache is NOT distributed. Each process maintains its
//! own cache state.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::{Cache, CacheManager, ValueLoader};
use crate::config::MokaSettings;
use crate::interceptor::{CacheKey, InvocationError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Why a load through `try_get_with` did not produce a storable value
#[derive(Debug)]
enum LoadFailure {
    Invocation(InvocationError),
    NullValue,
}

#[derive(Clone)]
pub struct MokaCache {
    name: String,
    cache: moka::sync::Cache<CacheKey, Value>,
    time_to_live: Option<Duration>,
    allow_null_values: bool,
}

impl std::fmt::Debug for MokaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("name", &self.name)
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .field("time_to_live", &self.time_to_live)
            .finish()
    }
}

impl MokaCache {
    /// Create a new Moka cache from settings
    pub fn from_settings(name: impl Into<String>, settings: &MokaSettings, allow_null_values: bool) -> Self {
        let name = name.into();
        let time_to_live = settings.time_to_live();
        let mut builder = moka::sync::Cache::builder().max_capacity(settings.max_capacity);
        if let Some(ttl) = time_to_live {
            builder = builder.time_to_live(ttl);
        }

        debug!(
            cache = %name,
            max_capacity = settings.max_capacity,
            ttl_seconds = time_to_live.map(|t| t.as_secs()),
            "Moka in-memory cache created"
        );

        Self {
            name,
            cache: builder.build(),
            time_to_live,
            allow_null_values,
        }
    }

    /// Create with explicit bounds (for testing)
    pub fn new(name: impl Into<String>, max_capacity: u64) -> Self {
        let settings = MokaSettings {
            max_capacity,
            time_to_live_seconds: 0,
        };
        Self::from_settings(name, &settings, true)
    }

    fn check_storable(&self, value: &Value) -> CacheResult<()> {
        if value.is_null() && !self.allow_null_values {
            return Err(CacheError::NullValueNotAllowed {
                cache: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl Cache for MokaCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> CacheResult<Option<Value>> {
        let result = self.cache.get(key);

        if result.is_some() {
            debug!(cache = %self.name, key = %key, "Cache HIT (moka)");
        } else {
            debug!(cache = %self.name, key = %key, "Cache MISS (moka)");
        }

        Ok(result)
    }

    fn get_or_compute(&self, key: &CacheKey, loader: ValueLoader<'_>) -> CacheResult<Value> {
        let allow_null_values = self.allow_null_values;
        self.cache
            .try_get_with(key.clone(), || match loader() {
                Ok(Value::Null) if !allow_null_values => Err(LoadFailure::NullValue),
                Ok(value) => Ok(value),
                Err(error) => Err(LoadFailure::Invocation(error)),
            })
            .map_err(|failure| match &*failure {
                LoadFailure::Invocation(source) => CacheError::ValueRetrieval {
                    key: key.clone(),
                    source: source.clone(),
                },
                LoadFailure::NullValue => CacheError::NullValueNotAllowed {
                    cache: self.name.clone(),
                },
            })
    }

    fn put(&self, key: &CacheKey, value: Value) -> CacheResult<()> {
        self.check_storable(&value)?;
        self.cache.insert(key.clone(), value);
        debug!(cache = %self.name, key = %key, "Cache SET (moka)");
        Ok(())
    }

    fn put_if_absent(&self, key: &CacheKey, value: Value) -> CacheResult<Option<Value>> {
        self.check_storable(&value)?;
        let entry = self.cache.entry(key.clone()).or_insert(value);
        if entry.is_fresh() {
            Ok(None)
        } else {
            Ok(Some(entry.into_value()))
        }
    }

    fn evict(&self, key: &CacheKey) -> CacheResult<()> {
        self.cache.invalidate(key);
        debug!(cache = %self.name, key = %key, "Cache DEL (moka)");
        Ok(())
    }

    fn evict_if_present(&self, key: &CacheKey) -> CacheResult<bool> {
        let present = self.cache.remove(key).is_some();
        debug!(cache = %self.name, key = %key, present, "Cache DEL (moka)");
        Ok(present)
    }

    fn clear(&self) -> CacheResult<()> {
        // Moka applies invalidate_all lazily
        self.cache.invalidate_all();
        debug!(cache = %self.name, "Cache CLEAR (moka)");
        Ok(())
    }

    fn invalidate(&self) -> CacheResult<bool> {
        let had_entries = self.cache.iter().next().is_some();
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
        debug!(cache = %self.name, had_entries, "Cache CLEAR (moka)");
        Ok(had_entries)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}

/// Manager creating [`MokaCache`]s that share one set of bounds.
#[derive(Debug)]
pub struct MokaCacheManager {
    settings: MokaSettings,
    caches: RwLock<HashMap<String, Arc<MokaCache>>>,
    dynamic: bool,
    allow_null_values: bool,
}

impl MokaCacheManager {
    /// Dynamic manager: caches are created on first request
    pub fn new(settings: MokaSettings, allow_null_values: bool) -> Self {
        Self {
            settings,
            caches: RwLock::new(HashMap::new()),
            dynamic: true,
            allow_null_values,
        }
    }

    /// Static manager serving exactly the given caches
    pub fn with_cache_names<I, S>(settings: MokaSettings, allow_null_values: bool, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let caches = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let cache = Arc::new(MokaCache::from_settings(name.clone(), &settings, allow_null_values));
                (name, cache)
            })
            .collect();
        Self {
            settings,
            caches: RwLock::new(caches),
            dynamic: false,
            allow_null_values,
        }
    }
}

impl CacheManager for MokaCacheManager {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        if let Some(cache) = self.caches.read().get(name) {
            return Some(cache.clone());
        }
        if !self.dynamic {
            return None;
        }
        let mut caches = self.caches.write();
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(MokaCache::from_settings(name, &self.settings, self.allow_null_values))
            })
            .clone();
        Some(cache)
    }

    fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }
}
