//! # System Constants
//!
//! Names and defaults shared across the engine.

/// Name of the root type all classes extend
pub const OBJECT_TYPE_NAME: &str = "Object";

/// Expression variable bound to the method's return value
pub const RESULT_VARIABLE: &str = "result";

/// Prefix of environment variables read by [`crate::config`]
pub const CONFIG_ENV_PREFIX: &str = "CACHE_ASPECT";

/// Separator between nested keys in environment variable names
pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Name of the default key generator in [`NamedComponents`](crate::interceptor::NamedComponents)
pub const DEFAULT_KEY_GENERATOR: &str = "simpleKeyGenerator";

/// Expression root properties, available as `#root.<name>` or bare `<name>`
pub mod root {
    pub const METHOD: &str = "method";
    pub const METHOD_NAME: &str = "methodName";
    pub const TARGET: &str = "target";
    pub const TARGET_CLASS: &str = "targetClass";
    pub const ARGS: &str = "args";
    pub const CACHES: &str = "caches";
}
