//! # Cache Backends
//!
//! Storage the execution engine reads from and writes to.
//!
//! ## Architecture
//!
//! ```text
//! CacheManager (trait)                 <- name -> Arc<dyn Cache>
//!   ├── ConcurrentMapCacheManager      <- DashMap store, per-key single-flight
//!   ├── MokaCacheManager               <- bounded, optional TTL (feature cache-moka)
//!   ├── NoOpCacheManager               <- always miss, always succeed
//!   └── CompositeCacheManager          <- first manager that knows the name
//! ```
//!
//! Backends are object-safe trait objects so that resolvers can hand out a
//! mixed list of caches for one operation. Backend failures are reported as
//! [`CacheError`] and routed through the executor's error handler, which
//! decides whether the intercepted call fails.

pub mod errors;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use manager::CompositeCacheManager;
pub use provider::build_cache_manager;
pub use providers::{ConcurrentMapCache, ConcurrentMapCacheManager, NoOpCache, NoOpCacheManager};
pub use traits::{Cache, CacheManager, ValueLoader};

#[cfg(feature = "cache-moka")]
pub use providers::{MokaCache, MokaCacheManager};
