#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Cache Aspect
//!
//! Declarative cache-operation execution engine.
//!
//! ## Overview
//!
//! Methods carry caching intent as [`CacheOperation`] descriptors: a cacheable
//! read, an unconditional put, or an eviction. For each intercepted call the
//! [`CacheOperationExecutor`] decides whether the underlying function runs at
//! all, which caches are consulted, which keys are used and in what order
//! reads, writes and evictions happen.
//!
//! ## Key Features
//!
//! - **Read-through caching** with the first hit across operations and caches winning
//! - **Single-flight** synchronized reads delegated to the cache backend
//! - **Conditions, keys and vetoes** as small expressions over the invocation
//! - **Isolated backend failures** routed through a pluggable error handler
//! - **Fallback operation lookup** from implementation to declaring types, memoized
//!
//! ## Module Organization
//!
//! - [`interceptor`] - Operation descriptors, sources and the executor
//! - [`cache`] - Cache and cache manager contracts and bundled backends
//! - [`expression`] - Expression evaluation for conditions, keys and `unless`
//! - [`config`] - Settings loading with the `config` crate
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Structured error handling
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod expression;
pub mod interceptor;
pub mod logging;

pub use cache::{Cache, CacheError, CacheManager, CacheResult};
pub use config::{CachingSettings, ConfigurationError};
pub use error::{CacheAspectError, Result};
pub use expression::{ExpressionError, ExpressionEvaluator, CachingExpressionEvaluator};
pub use interceptor::{
    CacheKey, CacheOperation, CacheOperationExecutor, CacheOperationSource, InvocationError,
    OperationKind, Target,
};
