//! Operation source over several sources

use super::{no_operations, CacheOperationSource, Operations};
use crate::interceptor::method::{MethodRef, TypeDescriptor};
use std::sync::Arc;

/// Concatenates the operations every delegate reports, in delegate order.
#[derive(Debug, Clone, Default)]
pub struct CompositeCacheOperationSource {
    sources: Vec<Arc<dyn CacheOperationSource>>,
}

impl CompositeCacheOperationSource {
    pub fn new(sources: Vec<Arc<dyn CacheOperationSource>>) -> Self {
        Self { sources }
    }

    pub fn with_source(mut self, source: Arc<dyn CacheOperationSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl CacheOperationSource for CompositeCacheOperationSource {
    fn operations_for(&self, method: &MethodRef, target_type: &Arc<TypeDescriptor>) -> Operations {
        let mut found = Vec::new();
        for source in &self.sources {
            found.extend(source.operations_for(method, target_type).iter().cloned());
        }
        if found.is_empty() {
            no_operations()
        } else {
            Arc::from(found)
        }
    }

    fn clear(&self) {
        for source in &self.sources {
            source.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::source::{FallbackCacheOperationSource, NameMatchCacheOperationSource};
    use crate::interceptor::{CacheOperation, DeclaredOperations, MethodBuilder};

    #[test]
    fn test_concatenates_in_source_order() {
        let ty = TypeDescriptor::class("Svc")
            .method(MethodBuilder::public("load"))
            .method(MethodBuilder::public("other"))
            .build();
        let load = ty.declared_method("load").unwrap();

        let declared = DeclaredOperations::new();
        declared
            .declare_method(&load, [CacheOperation::cacheable().cache_name("declared")])
            .unwrap();
        let by_name = NameMatchCacheOperationSource::new();
        by_name
            .add_method("lo*", [CacheOperation::evict().cache_name("matched")])
            .unwrap();

        let declared: Arc<dyn CacheOperationSource> =
            Arc::new(FallbackCacheOperationSource::new(declared));
        let composite = CompositeCacheOperationSource::new(vec![declared])
            .with_source(Arc::new(by_name));

        let ops = composite.operations_for(&load, &ty);
        let caches: Vec<&str> = ops.iter().map(|op| op.cache_names()[0].as_str()).collect();
        assert_eq!(caches, vec!["declared", "matched"]);

        let other = ty.declared_method("other").unwrap();
        assert!(composite.operations_for(&other, &ty).is_empty());
    }
}
