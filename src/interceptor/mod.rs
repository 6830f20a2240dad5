//! # Cache Interception
//!
//! The execution engine and everything it talks to.
//!
//! ## Flow
//!
//! ```text
//! intercepted call ─► CacheOperationSource ─► [CacheOperation...]
//!                                                   │
//!                     CacheOperationExecutor ◄──────┘
//!                       ├── CacheResolver        which caches
//!                       ├── KeyGenerator         key when no key expression
//!                       ├── ExpressionEvaluator  condition / key / unless
//!                       ├── Cache                get / put / evict / clear
//!                       └── CacheErrorHandler    backend failures
//! ```
//!
//! ## Example
//!
//! ```rust
//! use cache_aspect::cache::ConcurrentMapCacheManager;
//! use cache_aspect::interceptor::{
//!     CacheOperation, CacheOperationExecutor, DeclaredOperations,
//!     FallbackCacheOperationSource, MethodBuilder, Target, TypeDescriptor,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> cache_aspect::Result<()> {
//! let users = TypeDescriptor::class("UserService")
//!     .method(MethodBuilder::public("find").param("id", "i64"))
//!     .build();
//! let find = users.method("find").expect("declared above");
//!
//! let declared = DeclaredOperations::new();
//! declared.declare_method(&find, [CacheOperation::cacheable().cache_name("users").key("#id")])?;
//!
//! let executor = CacheOperationExecutor::builder()
//!     .operation_source(Arc::new(FallbackCacheOperationSource::new(declared)))
//!     .cache_manager(Arc::new(ConcurrentMapCacheManager::new()))
//!     .build()?;
//!
//! let target = Target::of(users);
//! let first = executor.execute(|| Ok(json!({"id": 7})), &target, &find, vec![json!(7)])?;
//! let second = executor.execute(|| unreachable!("served from cache"), &target, &find, vec![json!(7)])?;
//! assert_eq!(first, second);
//! # Ok(())
//! # }
//! ```

mod components;
mod context;
mod error_handler;
mod executor;
mod invoker;
mod key;
mod metadata;
mod method;
mod operation;
mod resolver;
pub mod source;

pub use components::NamedComponents;
pub use error_handler::{CacheErrorHandler, LoggingCacheErrorHandler, SimpleCacheErrorHandler};
pub use executor::{CacheOperationExecutor, CacheOperationExecutorBuilder};
pub use invoker::InvocationError;
pub use key::{CacheKey, KeyGenerator, SimpleKey, SimpleKeyGenerator};
pub use metadata::{OperationMetadata, OperationMetadataCache};
pub use method::{
    ElementKey, Method, MethodBuilder, MethodKey, MethodRef, MethodSignature, Parameter, Target,
    TypeBuilder, TypeDescriptor, TypeKind, Visibility,
};
pub use operation::{CacheDefaults, CacheOperation, CacheOperationBuilder, OperationKind};
pub use resolver::{CacheResolver, NamedCacheResolver, OperationInvocation, SimpleCacheResolver};
pub use source::{
    CacheOperationSource, CompositeCacheOperationSource, DeclaredOperations,
    FallbackCacheOperationSource, NameMatchCacheOperationSource, OperationMetadataProvider,
    Operations,
};
