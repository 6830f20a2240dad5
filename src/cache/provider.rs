//! Cache manager selection from settings
//!
//! Backend choice never fails: a disabled, unknown or unavailable backend
//! degrades to the no-op manager with a warning, so a misconfigured cache
//! turns caching off instead of blocking startup.

use super::providers::{ConcurrentMapCacheManager, NoOpCacheManager};
use super::traits::CacheManager;
use crate::config::CacheManagerSettings;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "cache-moka")]
use super::providers::MokaCacheManager;

/// Build the cache manager described by `settings`.
pub fn build_cache_manager(settings: &CacheManagerSettings) -> Arc<dyn CacheManager> {
    if !settings.enabled {
        info!("Caching disabled by configuration");
        return Arc::new(NoOpCacheManager::new());
    }

    match settings.backend.as_str() {
        "concurrent_map" | "map" | "memory" => create_concurrent_map_manager(settings),
        "moka" | "in-memory" => create_moka_manager(settings),
        "noop" | "none" => Arc::new(NoOpCacheManager::new()),
        other => {
            warn!(backend = other, "Unknown cache backend, falling back to NoOp");
            Arc::new(NoOpCacheManager::new())
        }
    }
}

/// Whether the manager should serve only the configured cache names
fn is_static(settings: &CacheManagerSettings) -> bool {
    !settings.dynamic && !settings.cache_names.is_empty()
}

fn create_concurrent_map_manager(settings: &CacheManagerSettings) -> Arc<dyn CacheManager> {
    let manager = if is_static(settings) {
        ConcurrentMapCacheManager::with_cache_names(settings.cache_names.iter().cloned())
    } else {
        let manager = ConcurrentMapCacheManager::new();
        for name in &settings.cache_names {
            manager.get_cache(name);
        }
        manager
    }
    .allow_null_values(settings.allow_null_values);

    info!(
        backend = "concurrent_map",
        dynamic = manager.is_dynamic(),
        caches = settings.cache_names.len(),
        "Cache manager initialized"
    );
    Arc::new(manager)
}

#[cfg(feature = "cache-moka")]
fn create_moka_manager(settings: &CacheManagerSettings) -> Arc<dyn CacheManager> {
    let manager = if is_static(settings) {
        MokaCacheManager::with_cache_names(
            settings.moka.clone(),
            settings.allow_null_values,
            settings.cache_names.iter().cloned(),
        )
    } else {
        let manager = MokaCacheManager::new(settings.moka.clone(), settings.allow_null_values);
        for name in &settings.cache_names {
            manager.get_cache(name);
        }
        manager
    };

    info!(
        backend = "moka",
        max_capacity = settings.moka.max_capacity,
        ttl_seconds = settings.moka.time_to_live_seconds,
        "Cache manager initialized"
    );
    Arc::new(manager)
}

/// Fallback when cache-moka feature is not enabled
#[cfg(not(feature = "cache-moka"))]
fn create_moka_manager(_settings: &CacheManagerSettings) -> Arc<dyn CacheManager> {
    warn!("Moka cache backend requested but 'cache-moka' feature not enabled, using NoOp");
    Arc::new(NoOpCacheManager::new())
}
