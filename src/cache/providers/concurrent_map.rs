//! In-process cache backed by a concurrent hash map
//!
//! The default backend. Entries live until evicted or cleared; there is no
//! size bound or expiry. `get_or_compute` is single-flight per key: callers
//! racing on the same missing key wait on a per-key lock and the loser
//! observes the winner's value. If the winner's loader fails, the next
//! waiter loads under the same lock.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::{Cache, CacheManager, ValueLoader};
use crate::interceptor::CacheKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Per-key load lock, shared by every caller waiting on the key
#[derive(Debug, Default)]
struct InFlight {
    lock: Mutex<()>,
    loader: Mutex<Option<ThreadId>>,
}

#[derive(Debug)]
pub struct ConcurrentMapCache {
    name: String,
    store: DashMap<CacheKey, Value>,
    in_flight: DashMap<CacheKey, Arc<InFlight>>,
    allow_null_values: bool,
}

impl ConcurrentMapCache {
    /// Create a cache that allows null values
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_null_values(name, true)
    }

    pub fn with_null_values(name: impl Into<String>, allow_null_values: bool) -> Self {
        Self {
            name: name.into(),
            store: DashMap::new(),
            in_flight: DashMap::new(),
            allow_null_values,
        }
    }

    pub fn allows_null_values(&self) -> bool {
        self.allow_null_values
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.store.contains_key(key)
    }

    fn check_storable(&self, value: &Value) -> CacheResult<()> {
        if value.is_null() && !self.allow_null_values {
            return Err(CacheError::NullValueNotAllowed {
                cache: self.name.clone(),
            });
        }
        Ok(())
    }

    fn lookup(&self, key: &CacheKey) -> Option<Value> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    /// Runs with the key's load lock held
    fn load_locked(
        &self,
        key: &CacheKey,
        in_flight: &InFlight,
        loader: ValueLoader<'_>,
    ) -> CacheResult<Value> {
        // another caller may have finished while we waited
        if let Some(value) = self.lookup(key) {
            trace!(cache = %self.name, key = %key, "Value computed by concurrent caller");
            return Ok(value);
        }

        *in_flight.loader.lock() = Some(thread::current().id());
        let loaded = loader();
        *in_flight.loader.lock() = None;

        let value = loaded.map_err(|source| CacheError::ValueRetrieval {
            key: key.clone(),
            source,
        })?;
        self.check_storable(&value)?;
        self.store.insert(key.clone(), value.clone());
        debug!(cache = %self.name, key = %key, "Cache COMPUTE (concurrent_map)");
        Ok(value)
    }
}

impl Cache for ConcurrentMapCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> CacheResult<Option<Value>> {
        let result = self.lookup(key);
        if result.is_some() {
            debug!(cache = %self.name, key = %key, "Cache HIT (concurrent_map)");
        } else {
            debug!(cache = %self.name, key = %key, "Cache MISS (concurrent_map)");
        }
        Ok(result)
    }

    fn get_or_compute(&self, key: &CacheKey, loader: ValueLoader<'_>) -> CacheResult<Value> {
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }

        let in_flight = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(InFlight::default()))
            .clone();
        let current = thread::current().id();
        if *in_flight.loader.lock() == Some(current) {
            return Err(CacheError::backend(
                &self.name,
                format!("Recursive update: loader for key '{key}' called back into the cache"),
            ));
        }

        let _guard = in_flight.lock.lock();
        let outcome = self.load_locked(key, &in_flight, loader);
        // only the last holder drops the entry; waiters keep their clone alive
        self.in_flight.remove_if(key, |_, entry| {
            Arc::ptr_eq(entry, &in_flight) && Arc::strong_count(entry) == 2
        });
        outcome
    }

    fn put(&self, key: &CacheKey, value: Value) -> CacheResult<()> {
        self.check_storable(&value)?;
        self.store.insert(key.clone(), value);
        debug!(cache = %self.name, key = %key, "Cache SET (concurrent_map)");
        Ok(())
    }

    fn put_if_absent(&self, key: &CacheKey, value: Value) -> CacheResult<Option<Value>> {
        self.check_storable(&value)?;
        match self.store.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(Some(entry.get().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(None)
            }
        }
    }

    fn evict(&self, key: &CacheKey) -> CacheResult<()> {
        self.store.remove(key);
        debug!(cache = %self.name, key = %key, "Cache DEL (concurrent_map)");
        Ok(())
    }

    fn evict_if_present(&self, key: &CacheKey) -> CacheResult<bool> {
        let present = self.store.remove(key).is_some();
        debug!(cache = %self.name, key = %key, present, "Cache DEL (concurrent_map)");
        Ok(present)
    }

    fn clear(&self) -> CacheResult<()> {
        self.store.clear();
        debug!(cache = %self.name, "Cache CLEAR (concurrent_map)");
        Ok(())
    }

    fn invalidate(&self) -> CacheResult<bool> {
        let had_entries = !self.store.is_empty();
        self.store.clear();
        debug!(cache = %self.name, had_entries, "Cache CLEAR (concurrent_map)");
        Ok(had_entries)
    }

    fn provider_name(&self) -> &'static str {
        "concurrent_map"
    }
}

/// Manager for [`ConcurrentMapCache`]s.
///
/// Dynamic by default: unknown names create a cache on first request. Once
/// created with a fixed set of names the manager is static and unknown names
/// resolve to `None`.
#[derive(Debug)]
pub struct ConcurrentMapCacheManager {
    caches: DashMap<String, Arc<ConcurrentMapCache>>,
    dynamic: bool,
    allow_null_values: bool,
}

impl Default for ConcurrentMapCacheManager {
    fn default() -> Self {
        Self {
            caches: DashMap::new(),
            dynamic: true,
            allow_null_values: true,
        }
    }
}

impl ConcurrentMapCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static manager serving exactly the given caches
    pub fn with_cache_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let manager = Self {
            dynamic: false,
            ..Self::default()
        };
        for name in names {
            let name = name.into();
            manager.caches.insert(
                name.clone(),
                Arc::new(ConcurrentMapCache::with_null_values(name, manager.allow_null_values)),
            );
        }
        manager
    }

    /// Set the null-value policy; existing caches are recreated empty.
    pub fn allow_null_values(mut self, allow: bool) -> Self {
        if allow != self.allow_null_values {
            self.allow_null_values = allow;
            for mut entry in self.caches.iter_mut() {
                let name = entry.key().clone();
                *entry.value_mut() = Arc::new(ConcurrentMapCache::with_null_values(name, allow));
            }
        }
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Typed access to a cache, without creating it
    pub fn cache(&self, name: &str) -> Option<Arc<ConcurrentMapCache>> {
        self.caches.get(name).map(|entry| entry.value().clone())
    }
}

impl CacheManager for ConcurrentMapCacheManager {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        if let Some(cache) = self.cache(name) {
            return Some(cache);
        }
        if !self.dynamic {
            return None;
        }
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(cache = name, "Creating concurrent map cache on demand");
                Arc::new(ConcurrentMapCache::with_null_values(name, self.allow_null_values))
            })
            .clone();
        Some(cache)
    }

    fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
