//! Cache provider implementations

pub mod concurrent_map;
pub mod noop;

#[cfg(feature = "cache-moka")]
pub mod moka;

pub use concurrent_map::{ConcurrentMapCache, ConcurrentMapCacheManager};
pub use noop::{NoOpCache, NoOpCacheManager};

#[cfg(feature = "cache-moka")]
pub use self::moka::{MokaCache, MokaCacheManager};
