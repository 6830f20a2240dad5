//! # Cache Expressions
//!
//! Conditions, keys and `unless` vetoes are written as small expressions over
//! the invocation: its arguments, target, method, resolved caches and, once
//! the method has returned, its result.
//!
//! ```text
//! #id                         first parameter named `id`
//! #p0 / #a0                   first argument by position
//! #user?.address.city         safe navigation
//! #root.methodName            root object properties (also bare: methodName)
//! #result == null             result, only after the invocation
//! #id > 10 and #name != ''    comparison and logic
//! {#a, #b}                    inline list
//! ```
//!
//! The engine talks to the language only through [`ExpressionEvaluator`];
//! [`CachingExpressionEvaluator`] is the bundled implementation.

mod evaluator;
pub(crate) mod parser;

pub use evaluator::CachingExpressionEvaluator;

use crate::constants::{root, RESULT_VARIABLE};
use crate::interceptor::{ElementKey, Method, Target};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing or evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Failed to parse expression '{expression}' at position {position}: {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },

    /// A variable that exists but has no value yet, i.e. `#result` before
    /// the method has returned
    #[error("Variable '{name}' is not available in this evaluation context")]
    VariableNotAvailable { name: String },

    #[error("Cannot access '{property}' on null")]
    PropertyOnNull { property: String },

    #[error("Unknown property '{name}'")]
    UnknownProperty { name: String },

    #[error("Unknown method '{name}' on {receiver}")]
    UnknownMethod { name: String, receiver: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Division by zero")]
    DivisionByZero,
}

impl ExpressionError {
    pub(crate) fn type_mismatch(expected: &str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: type_name(found).to_string(),
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether the method's result can be referenced
#[derive(Debug, Clone, Copy)]
pub enum ResultState<'a> {
    /// Before the invocation; `#result` is unset and evaluates to null
    NoResult,
    /// Deciding whether a put will run; `#result` raises
    /// [`ExpressionError::VariableNotAvailable`]
    Unavailable,
    Available(&'a Value),
}

/// Everything an expression can see about one invocation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// The dispatched method
    pub method: &'a Method,
    /// The most specific implementation; parameter names come from here
    pub target_method: &'a Method,
    pub target: &'a Target,
    /// Arguments with varargs already expanded
    pub args: &'a [Value],
    /// Names of the caches resolved for the operation
    pub cache_names: &'a [String],
    pub result: ResultState<'a>,
}

impl EvaluationContext<'_> {
    /// Resolve `#name`. Unknown variables evaluate to null.
    pub fn lookup_variable(&self, name: &str) -> Result<Value, ExpressionError> {
        if name == RESULT_VARIABLE {
            return match self.result {
                ResultState::Available(value) => Ok(value.clone()),
                ResultState::NoResult => Ok(Value::Null),
                ResultState::Unavailable => Err(ExpressionError::VariableNotAvailable {
                    name: name.to_string(),
                }),
            };
        }
        if name == "root" || name == "this" {
            return Ok(self.root_object());
        }
        Ok(self.argument_variable(name).unwrap_or(Value::Null))
    }

    /// `#a<i>`, `#p<i>` and parameter names. When more arguments than
    /// parameters are present the last parameter sees the remainder as an
    /// array.
    fn argument_variable(&self, name: &str) -> Option<Value> {
        let param_names: Vec<&str> = self.target_method.param_names().collect();
        let param_count = param_names.len();

        let index = name
            .strip_prefix('a')
            .or_else(|| name.strip_prefix('p'))
            .and_then(|digits| digits.parse::<usize>().ok())
            .filter(|i| *i < param_count)
            .or_else(|| param_names.iter().position(|p| *p == name))?;

        let args_count = self.args.len();
        let value = if args_count > param_count && index == param_count - 1 {
            Value::Array(self.args[index..].to_vec())
        } else {
            self.args.get(index).cloned().unwrap_or(Value::Null)
        };
        Some(value)
    }

    /// A property of the root object, `None` for unknown names
    pub fn root_property(&self, name: &str) -> Option<Value> {
        let value = match name {
            root::METHOD => json!({
                "name": self.method.name(),
                "declaringType": self.method.declaring_type(),
                "parameterTypes": self.method.signature().param_types,
            }),
            root::METHOD_NAME => Value::String(self.method.name().to_string()),
            root::TARGET => self.target.state().clone(),
            root::TARGET_CLASS => Value::String(self.target.target_type().name().to_string()),
            root::ARGS => Value::Array(self.args.to_vec()),
            root::CACHES => Value::Array(
                self.cache_names
                    .iter()
                    .map(|name| json!({ "name": name }))
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }

    pub fn root_object(&self) -> Value {
        let mut object = serde_json::Map::new();
        for name in [
            root::METHOD,
            root::METHOD_NAME,
            root::TARGET,
            root::TARGET_CLASS,
            root::ARGS,
            root::CACHES,
        ] {
            if let Some(value) = self.root_property(name) {
                object.insert(name.to_string(), value);
            }
        }
        Value::Object(object)
    }
}

/// Evaluates the expression attributes of cache operations.
///
/// `element` identifies the method on its target type so implementations
/// can cache compiled expressions per element.
pub trait ExpressionEvaluator: Send + Sync + fmt::Debug {
    fn condition(
        &self,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, ExpressionError>;

    fn key(
        &self,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<Value, ExpressionError>;

    fn unless(
        &self,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, ExpressionError>;

    /// Drop any compiled-expression caches
    fn clear(&self);
}
