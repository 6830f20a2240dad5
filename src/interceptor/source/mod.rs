//! # Operation Sources
//!
//! An operation source answers "which cache operations apply to this method
//! when called on this target type". [`FallbackCacheOperationSource`] walks
//! from the most specific implementation to the declaring types and memoizes
//! the answer; the metadata it walks over comes from an
//! [`OperationMetadataProvider`] such as [`DeclaredOperations`].

mod composite;
mod declared;
mod name_match;

pub use composite::CompositeCacheOperationSource;
pub use declared::DeclaredOperations;
pub use name_match::NameMatchCacheOperationSource;

use super::method::{ElementKey, Method, MethodRef, TypeDescriptor};
use super::operation::CacheOperation;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Operations attached to one method, in declaration order
pub type Operations = Arc<[Arc<CacheOperation>]>;

pub(crate) fn no_operations() -> Operations {
    Arc::from(Vec::new())
}

pub trait CacheOperationSource: Send + Sync + fmt::Debug {
    /// Operations for `method` invoked on `target_type`; empty when the
    /// method is not cacheable.
    fn operations_for(&self, method: &MethodRef, target_type: &Arc<TypeDescriptor>) -> Operations;

    /// Forget memoized answers
    fn clear(&self) {}
}

/// Raw operation metadata attached to methods and types.
///
/// Implementations return `None` (or an empty list) when nothing is
/// declared on the element.
pub trait OperationMetadataProvider: Send + Sync + fmt::Debug {
    fn method_operations(&self, method: &Method) -> Option<Operations>;

    fn type_operations(&self, type_name: &str) -> Option<Operations>;
}

/// Operation source that searches, in order, the most specific method, the
/// type declaring it, the dispatched method and the type declaring that,
/// stopping at the first element with operations.
///
/// Results, including "nothing found", are memoized per method and target
/// type.
#[derive(Debug)]
pub struct FallbackCacheOperationSource<P> {
    provider: P,
    public_methods_only: bool,
    memo: DashMap<ElementKey, Option<Operations>>,
}

impl<P: OperationMetadataProvider> FallbackCacheOperationSource<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            public_methods_only: true,
            memo: DashMap::new(),
        }
    }

    /// Whether only public methods can carry cache operations (default)
    pub fn public_methods_only(mut self, enabled: bool) -> Self {
        self.public_methods_only = enabled;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Number of memoized (method, target type) answers
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }

    pub fn clear_memo(&self) {
        self.memo.clear();
    }

    fn compute(&self, method: &MethodRef, target_type: &TypeDescriptor) -> Option<Operations> {
        if self.public_methods_only && !method.is_public() {
            return None;
        }
        if method.is_object_method() {
            return None;
        }

        let specific = target_type.most_specific_method(method);
        let user_level = method.is_user_level();

        if let Some(ops) = self.non_empty(self.provider.method_operations(&specific)) {
            return Some(ops);
        }
        if user_level {
            if let Some(ops) = self.non_empty(self.provider.type_operations(specific.declaring_type())) {
                return Some(ops);
            }
        }

        if specific.key() != method.key() {
            if let Some(ops) = self.non_empty(self.provider.method_operations(method)) {
                return Some(ops);
            }
            if user_level {
                return self.non_empty(self.provider.type_operations(method.declaring_type()));
            }
        }
        None
    }

    fn non_empty(&self, ops: Option<Operations>) -> Option<Operations> {
        ops.filter(|ops| !ops.is_empty())
    }
}

impl<P: OperationMetadataProvider> CacheOperationSource for FallbackCacheOperationSource<P> {
    fn operations_for(&self, method: &MethodRef, target_type: &Arc<TypeDescriptor>) -> Operations {
        let element = ElementKey::new(method, target_type);
        if let Some(cached) = self.memo.get(&element) {
            return cached.value().clone().unwrap_or_else(no_operations);
        }

        let found = self.compute(method, target_type);
        match &found {
            Some(ops) => trace!(
                element = %element,
                operations = ops.len(),
                "Adding cacheable method"
            ),
            None => trace!(element = %element, "Method has no cache operations"),
        }
        self.memo.insert(element, found.clone());
        found.unwrap_or_else(no_operations)
    }

    fn clear(&self) {
        self.clear_memo();
    }
}
