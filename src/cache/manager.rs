//! Composite cache manager
//!
//! Delegates to a list of managers and returns the first cache any of them
//! knows. With `fallback_to_noop` a [`NoOpCacheManager`] is appended so that
//! every name resolves, which is handy when caching is being switched off
//! for part of a system.

use super::providers::NoOpCacheManager;
use super::traits::{Cache, CacheManager};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CompositeCacheManager {
    managers: Vec<Arc<dyn CacheManager>>,
}

impl CompositeCacheManager {
    pub fn new(managers: Vec<Arc<dyn CacheManager>>) -> Self {
        Self { managers }
    }

    pub fn with_manager(mut self, manager: Arc<dyn CacheManager>) -> Self {
        self.managers.push(manager);
        self
    }

    /// Append a no-op manager that answers for any name not found earlier
    pub fn fallback_to_noop(mut self) -> Self {
        self.managers.push(Arc::new(NoOpCacheManager::new()));
        self
    }
}

impl CacheManager for CompositeCacheManager {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        self.managers
            .iter()
            .find_map(|manager| manager.get_cache(name))
    }

    fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for manager in &self.managers {
            for name in manager.cache_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ConcurrentMapCacheManager;

    #[test]
    fn test_first_manager_with_cache_wins() {
        let first = Arc::new(ConcurrentMapCacheManager::with_cache_names(["users"]));
        let second = Arc::new(ConcurrentMapCacheManager::with_cache_names(["users", "orders"]));
        let composite = CompositeCacheManager::new(vec![first.clone(), second.clone()]);

        let users = composite.get_cache("users").unwrap();
        let from_first = first.get_cache("users").unwrap();
        assert!(Arc::ptr_eq(&users, &from_first));
        assert!(composite.get_cache("orders").is_some());
        assert!(composite.get_cache("missing").is_none());
        assert_eq!(composite.cache_names(), vec!["users", "orders"]);
    }

    #[test]
    fn test_noop_fallback_resolves_unknown_names() {
        let composite = CompositeCacheManager::default()
            .with_manager(Arc::new(ConcurrentMapCacheManager::with_cache_names(["users"])))
            .fallback_to_noop();

        let cache = composite.get_cache("anything").unwrap();
        assert_eq!(cache.provider_name(), "noop");
        assert_eq!(composite.get_cache("users").unwrap().provider_name(), "concurrent_map");
    }
}
