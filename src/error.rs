//! Error types for the cache aspect.
//!

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use crate::expression::ExpressionError;
use crate::interceptor::InvocationError;
use thiserror::Error;

/// Top-level error returned by the execution engine.
///
/// From a caller's perspective an intercepted call either returns a value,
/// fails with exactly the error the underlying function produced
/// ([`CacheAspectError::Invocation`]), or fails with a configuration problem
/// discovered on first use.
#[derive(Debug, Error)]
pub enum CacheAspectError {
    /// The underlying function failed. Carries the original cause unchanged.
    #[error(transparent)]
    Invocation(InvocationError),

    /// A cache backend failed and the error handler chose to rethrow.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Invalid operation declaration or wiring. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A condition, key or unless expression could not be evaluated.
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// A computed value was unusable, e.g. a key expression yielding null.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Settings could not be loaded or validated.
    #[error(transparent)]
    Settings(#[from] ConfigurationError),
}

impl CacheAspectError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Settings(_))
    }

    /// The original invocation failure, if this error is one.
    pub fn invocation_error(&self) -> Option<&InvocationError> {
        match self {
            Self::Invocation(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_variable_not_available(&self) -> bool {
        matches!(
            self,
            Self::Expression(ExpressionError::VariableNotAvailable { .. })
        )
    }
}

impl From<InvocationError> for CacheAspectError {
    fn from(error: InvocationError) -> Self {
        Self::Invocation(error)
    }
}

pub type Result<T> = std::result::Result<T, CacheAspectError>;
