//! # Caching Configuration
//!
//! Typed settings for wiring an executor from configuration instead of code.
//!
//! ## Sources
//!
//! Layered with later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`CachingSettings::default`])
//! 2. An optional TOML (or any format the `config` crate detects) file
//! 3. Environment variables prefixed with `CACHE_ASPECT__`, nested keys
//!    separated by `__`, e.g. `CACHE_ASPECT__CACHE_MANAGER__BACKEND=moka`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cache_aspect::config::CachingSettings;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = CachingSettings::load(Some(Path::new("config/caching.toml")))?;
//! assert!(!settings.cache_manager.backend.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod error;

use crate::constants::{CONFIG_ENV_PREFIX, CONFIG_ENV_SEPARATOR};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub use error::ConfigurationError;

/// What the executor does with cache backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlingMode {
    /// Fail the intercepted call with the backend error
    #[default]
    Rethrow,
    /// Log at warn and continue as if the cache were absent
    Log,
}

/// Root settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingSettings {
    /// Only public methods are considered for caching
    pub public_methods_only: bool,
    pub error_handler: ErrorHandlingMode,
    pub cache_manager: CacheManagerSettings,
}

impl Default for CachingSettings {
    fn default() -> Self {
        Self {
            public_methods_only: true,
            error_handler: ErrorHandlingMode::default(),
            cache_manager: CacheManagerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheManagerSettings {
    /// When false every cache is a no-op cache
    pub enabled: bool,
    /// `concurrent_map`, `moka` or `noop`
    pub backend: String,
    pub allow_null_values: bool,
    /// Create caches on first use; when false only `cache_names` exist
    pub dynamic: bool,
    pub cache_names: Vec<String>,
    pub moka: MokaSettings,
}

impl Default for CacheManagerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "concurrent_map".to_string(),
            allow_null_values: true,
            dynamic: true,
            cache_names: Vec::new(),
            moka: MokaSettings::default(),
        }
    }
}

/// Bounds for Moka-backed caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MokaSettings {
    pub max_capacity: u64,
    /// Zero disables expiry
    pub time_to_live_seconds: u64,
}

impl Default for MokaSettings {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live_seconds: 0,
        }
    }
}

impl MokaSettings {
    pub fn time_to_live(&self) -> Option<Duration> {
        (self.time_to_live_seconds > 0).then(|| Duration::from_secs(self.time_to_live_seconds))
    }
}

impl CachingSettings {
    /// Load from defaults, an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_from_sources(path, None)
    }

    /// Like [`load`](Self::load) but reads environment overrides from
    /// `environment` instead of the process environment.
    pub fn load_with_environment(
        path: Option<&Path>,
        environment: HashMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        Self::load_from_sources(path, Some(environment))
    }

    fn load_from_sources(
        path: Option<&Path>,
        environment: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::ConfigFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            builder = builder.add_source(File::from(path).required(true));
        }

        let env_source = Environment::with_prefix(CONFIG_ENV_PREFIX)
            .prefix_separator(CONFIG_ENV_SEPARATOR)
            .separator(CONFIG_ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cache_manager.cache_names")
            .source(environment.map(|vars| vars.into_iter().collect()));
        builder = builder.add_source(env_source);

        let settings: CachingSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints the types cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let manager = &self.cache_manager;
        if manager.backend.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "cache_manager.backend",
                manager.backend.clone(),
                "backend must not be empty",
            ));
        }
        if !manager.dynamic && manager.cache_names.is_empty() {
            return Err(ConfigurationError::validation_error(
                "cache_manager.dynamic = false requires at least one entry in cache_manager.cache_names",
            ));
        }
        if let Some(name) = manager.cache_names.iter().find(|n| n.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "cache_manager.cache_names",
                name.clone(),
                "cache names must not be blank",
            ));
        }
        if manager.moka.max_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache_manager.moka.max_capacity",
                "0",
                "capacity must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = CachingSettings::load_with_environment(None, HashMap::new()).unwrap();
        assert_eq!(settings, CachingSettings::default());
        assert!(settings.public_methods_only);
        assert_eq!(settings.cache_manager.backend, "concurrent_map");
        assert_eq!(settings.cache_manager.moka.time_to_live(), None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
public_methods_only = false
error_handler = "log"

[cache_manager]
backend = "moka"
cache_names = ["users", "orders"]

[cache_manager.moka]
max_capacity = 500
time_to_live_seconds = 30
"#
        )
        .unwrap();

        let settings =
            CachingSettings::load_with_environment(Some(file.path()), HashMap::new()).unwrap();
        assert!(!settings.public_methods_only);
        assert_eq!(settings.error_handler, ErrorHandlingMode::Log);
        assert_eq!(settings.cache_manager.backend, "moka");
        assert_eq!(settings.cache_manager.cache_names, vec!["users", "orders"]);
        assert_eq!(settings.cache_manager.moka.max_capacity, 500);
        assert_eq!(
            settings.cache_manager.moka.time_to_live(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cache_manager]\nbackend = \"moka\"").unwrap();

        let settings = CachingSettings::load_with_environment(
            Some(file.path()),
            env(&[
                ("CACHE_ASPECT__CACHE_MANAGER__BACKEND", "noop"),
                ("CACHE_ASPECT__CACHE_MANAGER__ALLOW_NULL_VALUES", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.cache_manager.backend, "noop");
        assert!(!settings.cache_manager.allow_null_values);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CachingSettings::load_with_environment(
            Some(&dir.path().join("absent.toml")),
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn test_static_manager_without_names_is_rejected() {
        let settings = CachingSettings {
            cache_manager: CacheManagerSettings {
                dynamic: false,
                ..CacheManagerSettings::default()
            },
            ..CachingSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut settings = CachingSettings::default();
        settings.cache_manager.moka.max_capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
