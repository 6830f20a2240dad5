//! Registry of named collaborators
//!
//! Operations refer to key generators, cache resolvers and cache managers by
//! name. Names are looked up here when an operation is first executed; an
//! unknown name is a configuration error.

use super::key::{KeyGenerator, SimpleKeyGenerator};
use super::resolver::CacheResolver;
use crate::cache::CacheManager;
use crate::constants::DEFAULT_KEY_GENERATOR;
use crate::error::{CacheAspectError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct NamedComponents {
    key_generators: DashMap<String, Arc<dyn KeyGenerator>>,
    cache_resolvers: DashMap<String, Arc<dyn CacheResolver>>,
    cache_managers: DashMap<String, Arc<dyn CacheManager>>,
}

impl Default for NamedComponents {
    fn default() -> Self {
        Self::new()
    }
}

impl NamedComponents {
    /// A registry holding only the [`SimpleKeyGenerator`], under
    /// [`DEFAULT_KEY_GENERATOR`].
    pub fn new() -> Self {
        let components = Self::empty();
        components.register_key_generator(DEFAULT_KEY_GENERATOR, Arc::new(SimpleKeyGenerator));
        components
    }

    pub fn empty() -> Self {
        Self {
            key_generators: DashMap::new(),
            cache_resolvers: DashMap::new(),
            cache_managers: DashMap::new(),
        }
    }

    pub fn register_key_generator(&self, name: impl Into<String>, generator: Arc<dyn KeyGenerator>) {
        let name = name.into();
        debug!(name = %name, "Registering key generator");
        self.key_generators.insert(name, generator);
    }

    pub fn register_cache_resolver(&self, name: impl Into<String>, resolver: Arc<dyn CacheResolver>) {
        let name = name.into();
        debug!(name = %name, "Registering cache resolver");
        self.cache_resolvers.insert(name, resolver);
    }

    pub fn register_cache_manager(&self, name: impl Into<String>, manager: Arc<dyn CacheManager>) {
        let name = name.into();
        debug!(name = %name, "Registering cache manager");
        self.cache_managers.insert(name, manager);
    }

    pub fn with_key_generator(self, name: impl Into<String>, generator: Arc<dyn KeyGenerator>) -> Self {
        self.register_key_generator(name, generator);
        self
    }

    pub fn with_cache_resolver(self, name: impl Into<String>, resolver: Arc<dyn CacheResolver>) -> Self {
        self.register_cache_resolver(name, resolver);
        self
    }

    pub fn with_cache_manager(self, name: impl Into<String>, manager: Arc<dyn CacheManager>) -> Self {
        self.register_cache_manager(name, manager);
        self
    }

    pub fn key_generator(&self, name: &str) -> Result<Arc<dyn KeyGenerator>> {
        self.key_generators
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| missing("key generator", name))
    }

    pub fn cache_resolver(&self, name: &str) -> Result<Arc<dyn CacheResolver>> {
        self.cache_resolvers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| missing("cache resolver", name))
    }

    pub fn cache_manager(&self, name: &str) -> Result<Arc<dyn CacheManager>> {
        self.cache_managers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| missing("cache manager", name))
    }
}

fn missing(kind: &str, name: &str) -> CacheAspectError {
    CacheAspectError::configuration(format!("No {kind} named '{name}' is registered"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoOpCacheManager;

    #[test]
    fn test_default_key_generator_is_registered() {
        let components = NamedComponents::new();
        assert!(components.key_generator(DEFAULT_KEY_GENERATOR).is_ok());
        assert!(NamedComponents::empty()
            .key_generator(DEFAULT_KEY_GENERATOR)
            .is_err());
    }

    #[test]
    fn test_unknown_names_are_configuration_errors() {
        let components = NamedComponents::new()
            .with_cache_manager("primary", Arc::new(NoOpCacheManager::new()));
        assert!(components.cache_manager("primary").is_ok());

        let err = components.cache_manager("secondary").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Configuration error: No cache manager named 'secondary' is registered"
        );
        assert!(components.cache_resolver("runtime").unwrap_err().is_configuration());
    }
}
