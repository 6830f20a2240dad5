//! Per-operation metadata cache
//!
//! Resolving the collaborators of an operation (key generator, cache
//! resolver, most specific method) happens once per operation, method and
//! target type, and is kept until the owning executor clears it.

use super::key::KeyGenerator;
use super::method::{ElementKey, MethodRef, TypeDescriptor};
use super::operation::CacheOperation;
use super::resolver::CacheResolver;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Collaborators resolved for one operation on one method and target type.
#[derive(Debug, Clone)]
pub struct OperationMetadata {
    pub operation: Arc<CacheOperation>,
    /// The dispatched method
    pub method: MethodRef,
    pub target_type: Arc<TypeDescriptor>,
    /// The most specific implementation of `method` on `target_type`
    pub target_method: MethodRef,
    /// Identity of `target_method` on `target_type`, used to cache expressions
    pub element: ElementKey,
    pub key_generator: Arc<dyn KeyGenerator>,
    pub cache_resolver: Arc<dyn CacheResolver>,
}

type MetadataKey = (Arc<CacheOperation>, ElementKey);

#[derive(Debug, Default)]
pub struct OperationMetadataCache {
    entries: DashMap<MetadataKey, Arc<OperationMetadata>>,
}

impl OperationMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached metadata, or the result of `build` stored for next time.
    /// A failing `build` stores nothing.
    pub fn get_or_try_insert<F>(
        &self,
        operation: &Arc<CacheOperation>,
        method: &MethodRef,
        target_type: &Arc<TypeDescriptor>,
        build: F,
    ) -> Result<Arc<OperationMetadata>>
    where
        F: FnOnce() -> Result<OperationMetadata>,
    {
        let key = (operation.clone(), ElementKey::new(method, target_type));
        if let Some(found) = self.entries.get(&key) {
            return Ok(found.value().clone());
        }
        let metadata = Arc::new(build()?);
        trace!(operation = %operation, element = %key.1, "Caching operation metadata");
        Ok(self.entries.entry(key).or_insert(metadata).value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
