//! Cache resolution
//!
//! A [`CacheResolver`] turns an operation and the invocation it applies to
//! into the concrete caches to use, in order.

use super::method::{Method, Target};
use super::operation::CacheOperation;
use crate::cache::{Cache, CacheManager};
use crate::error::{CacheAspectError, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The invocation an operation is being resolved for
#[derive(Debug, Clone, Copy)]
pub struct OperationInvocation<'a> {
    pub operation: &'a CacheOperation,
    pub target: &'a Target,
    pub method: &'a Method,
    /// Arguments with varargs already expanded
    pub args: &'a [Value],
}

pub trait CacheResolver: Send + Sync + fmt::Debug {
    /// Caches to use for the invocation, in resolution order.
    ///
    /// An empty result is turned into a configuration error by the executor.
    fn resolve_caches(&self, invocation: &OperationInvocation<'_>) -> Result<Vec<Arc<dyn Cache>>>;
}

fn lookup(
    manager: &dyn CacheManager,
    names: &[String],
    operation: &CacheOperation,
) -> Result<Vec<Arc<dyn Cache>>> {
    names
        .iter()
        .map(|name| {
            manager.get_cache(name).ok_or_else(|| {
                CacheAspectError::configuration(format!(
                    "Cannot find cache named '{name}' for {operation}"
                ))
            })
        })
        .collect()
}

/// Resolves the operation's own cache names against a [`CacheManager`].
#[derive(Debug, Clone)]
pub struct SimpleCacheResolver {
    cache_manager: Arc<dyn CacheManager>,
}

impl SimpleCacheResolver {
    pub fn new(cache_manager: Arc<dyn CacheManager>) -> Self {
        Self { cache_manager }
    }

    pub fn cache_manager(&self) -> &Arc<dyn CacheManager> {
        &self.cache_manager
    }
}

impl CacheResolver for SimpleCacheResolver {
    fn resolve_caches(&self, invocation: &OperationInvocation<'_>) -> Result<Vec<Arc<dyn Cache>>> {
        lookup(
            self.cache_manager.as_ref(),
            invocation.operation.cache_names(),
            invocation.operation,
        )
    }
}

/// Resolves a fixed list of cache names, ignoring the operation's own.
#[derive(Debug, Clone)]
pub struct NamedCacheResolver {
    cache_manager: Arc<dyn CacheManager>,
    cache_names: Vec<String>,
}

impl NamedCacheResolver {
    pub fn new<I, S>(cache_manager: Arc<dyn CacheManager>, cache_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache_manager,
            cache_names: cache_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl CacheResolver for NamedCacheResolver {
    fn resolve_caches(&self, invocation: &OperationInvocation<'_>) -> Result<Vec<Arc<dyn Cache>>> {
        lookup(self.cache_manager.as_ref(), &self.cache_names, invocation.operation)
    }
}
