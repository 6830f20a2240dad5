//! Tree-walking evaluator with per-element expression caches

use super::parser::{parse, BinaryOp, Expr, UnaryOp};
use super::{type_name, EvaluationContext, ExpressionError, ExpressionEvaluator};
use crate::interceptor::ElementKey;
use dashmap::DashMap;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::trace;

type ExpressionCache = DashMap<(ElementKey, String), Arc<Expr>>;

/// Bundled [`ExpressionEvaluator`].
///
/// Parsed expressions are cached per (element, expression text), in one
/// cache per attribute kind, until [`clear`](ExpressionEvaluator::clear).
#[derive(Debug, Default)]
pub struct CachingExpressionEvaluator {
    condition_cache: ExpressionCache,
    key_cache: ExpressionCache,
    unless_cache: ExpressionCache,
}

impl CachingExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parsed expressions currently cached
    pub fn cached_expressions(&self) -> usize {
        self.condition_cache.len() + self.key_cache.len() + self.unless_cache.len()
    }

    /// Evaluate `expression` once, without caching
    pub fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext<'_>,
    ) -> Result<Value, ExpressionError> {
        eval(&parse(expression)?, context)
    }

    fn compiled(
        cache: &ExpressionCache,
        expression: &str,
        element: &ElementKey,
    ) -> Result<Arc<Expr>, ExpressionError> {
        let cache_key = (element.clone(), expression.to_string());
        if let Some(expr) = cache.get(&cache_key) {
            return Ok(expr.value().clone());
        }
        let expr = Arc::new(parse(expression)?);
        trace!(element = %element, expression, "Parsed cache expression");
        cache.insert(cache_key, expr.clone());
        Ok(expr)
    }

    fn boolean(
        cache: &ExpressionCache,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, ExpressionError> {
        let expr = Self::compiled(cache, expression, element)?;
        match eval(&expr, context)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(ExpressionError::type_mismatch("boolean", &other)),
        }
    }
}

impl ExpressionEvaluator for CachingExpressionEvaluator {
    fn condition(
        &self,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, ExpressionError> {
        Self::boolean(&self.condition_cache, expression, element, context)
    }

    fn key(
        &self,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<Value, ExpressionError> {
        let expr = Self::compiled(&self.key_cache, expression, element)?;
        eval(&expr, context)
    }

    fn unless(
        &self,
        expression: &str,
        element: &ElementKey,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, ExpressionError> {
        Self::boolean(&self.unless_cache, expression, element, context)
    }

    fn clear(&self) {
        self.condition_cache.clear();
        self.key_cache.clear();
        self.unless_cache.clear();
    }
}

fn eval(expr: &Expr, ctx: &EvaluationContext<'_>) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => ctx.lookup_variable(name),
        Expr::Identifier(name) => {
            ctx.root_property(name)
                .ok_or_else(|| ExpressionError::UnknownProperty { name: name.clone() })
        }
        Expr::Property {
            target,
            name,
            null_safe,
        } => {
            let receiver = eval(target, ctx)?;
            if receiver.is_null() {
                return null_receiver(*null_safe, name);
            }
            property(&receiver, name)
        }
        Expr::MethodCall {
            target,
            name,
            args,
            null_safe,
        } => {
            let receiver = eval(target, ctx)?;
            if receiver.is_null() {
                return null_receiver(*null_safe, name);
            }
            let args = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call_method(&receiver, name, &args)
        }
        Expr::Index { target, index } => {
            let receiver = eval(target, ctx)?;
            let index = eval(index, ctx)?;
            index_into(&receiver, &index)
        }
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Unary { op, operand } => {
            let value = eval(operand, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!as_bool(&value)?)),
                UnaryOp::Negate => match number(&value)? {
                    Num::Int(i) => Ok(i
                        .checked_neg()
                        .map(Value::from)
                        .unwrap_or_else(|| float_value(-(i as f64)))),
                    Num::Float(f) => Ok(float_value(-f)),
                },
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, ctx),
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            if as_bool(&eval(condition, ctx)?)? {
                eval(then, ctx)
            } else {
                eval(otherwise, ctx)
            }
        }
        Expr::Elvis { value, fallback } => {
            let value = eval(value, ctx)?;
            match &value {
                Value::Null => eval(fallback, ctx),
                Value::String(s) if s.is_empty() => eval(fallback, ctx),
                _ => Ok(value),
            }
        }
    }
}

fn null_receiver(null_safe: bool, member: &str) -> Result<Value, ExpressionError> {
    if null_safe {
        Ok(Value::Null)
    } else {
        Err(ExpressionError::PropertyOnNull {
            property: member.to_string(),
        })
    }
}

fn property(receiver: &Value, name: &str) -> Result<Value, ExpressionError> {
    match receiver {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if name == "length" => Ok(Value::from(items.len())),
        _ => Err(ExpressionError::UnknownProperty {
            name: format!("{}.{name}", type_name(receiver)),
        }),
    }
}

fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    let unknown = || ExpressionError::UnknownMethod {
        name: name.to_string(),
        receiver: type_name(receiver).to_string(),
    };
    let string_arg = |i: usize| -> Result<&str, ExpressionError> {
        match args.get(i) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ExpressionError::type_mismatch("string", other)),
            None => Err(ExpressionError::type_mismatch("string", &Value::Null)),
        }
    };

    if name == "toString" && args.is_empty() {
        return Ok(Value::String(display(receiver)));
    }

    match (receiver, name, args.len()) {
        (Value::String(s), "length", 0) => Ok(Value::from(s.chars().count())),
        (Value::String(s), "isEmpty", 0) => Ok(Value::Bool(s.is_empty())),
        (Value::String(s), "toUpperCase", 0) => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "toLowerCase", 0) => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim", 0) => Ok(Value::String(s.trim().to_string())),
        (Value::String(s), "contains", 1) => Ok(Value::Bool(s.contains(string_arg(0)?))),
        (Value::String(s), "startsWith", 1) => Ok(Value::Bool(s.starts_with(string_arg(0)?))),
        (Value::String(s), "endsWith", 1) => Ok(Value::Bool(s.ends_with(string_arg(0)?))),
        (Value::Array(items), "size", 0) => Ok(Value::from(items.len())),
        (Value::Array(items), "isEmpty", 0) => Ok(Value::Bool(items.is_empty())),
        (Value::Array(items), "contains", 1) => Ok(Value::Bool(
            items.iter().any(|item| values_equal(item, &args[0])),
        )),
        (Value::Array(_), "get", 1) => index_into(receiver, &args[0]),
        (Value::Object(map), "size", 0) => Ok(Value::from(map.len())),
        (Value::Object(map), "isEmpty", 0) => Ok(Value::Bool(map.is_empty())),
        (Value::Object(map), "containsKey", 1) => Ok(Value::Bool(map.contains_key(string_arg(0)?))),
        (Value::Object(_), "get", 1) => index_into(receiver, &args[0]),
        _ => Err(unknown()),
    }
}

fn index_into(receiver: &Value, index: &Value) -> Result<Value, ExpressionError> {
    match receiver {
        Value::Null => Err(ExpressionError::PropertyOnNull {
            property: format!("[{index}]"),
        }),
        Value::Array(items) => {
            let i = index
                .as_i64()
                .ok_or_else(|| ExpressionError::type_mismatch("integer index", index))?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(ExpressionError::IndexOutOfBounds {
                    index: i,
                    len: items.len(),
                })
        }
        Value::String(s) => {
            let i = index
                .as_i64()
                .ok_or_else(|| ExpressionError::type_mismatch("integer index", index))?;
            let len = s.chars().count();
            usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .ok_or(ExpressionError::IndexOutOfBounds { index: i, len })
        }
        Value::Object(map) => match index {
            Value::String(key) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            other => Ok(map.get(&display(other)).cloned().unwrap_or(Value::Null)),
        },
        other => Err(ExpressionError::type_mismatch("array, string or object", other)),
    }
}

fn binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &EvaluationContext<'_>,
) -> Result<Value, ExpressionError> {
    // short-circuit forms first
    match op {
        BinaryOp::And => {
            if !as_bool(&eval(left, ctx)?)? {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(as_bool(&eval(right, ctx)?)?));
        }
        BinaryOp::Or => {
            if as_bool(&eval(left, ctx)?)? {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(as_bool(&eval(right, ctx)?)?));
        }
        _ => {}
    }

    let l = eval(left, ctx)?;
    let r = eval(right, ctx)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&l, &r)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&l, &r)? != Ordering::Less)),
        BinaryOp::Add if l.is_string() || r.is_string() => {
            Ok(Value::String(format!("{}{}", display(&l), display(&r))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, number(&l)?, number(&r)?)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn number(value: &Value) -> Result<Num, ExpressionError> {
    match value {
        Value::Number(n) => Ok(n
            .as_i64()
            .map(Num::Int)
            .unwrap_or_else(|| Num::Float(n.as_f64().unwrap_or(f64::NAN)))),
        other => Err(ExpressionError::type_mismatch("number", other)),
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn arithmetic(op: BinaryOp, l: Num, r: Num) -> Result<Value, ExpressionError> {
    if let (Num::Int(a), Num::Int(b)) = (l, r) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(ExpressionError::DivisionByZero),
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let (a, b) = (l.as_f64(), r.as_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ExpressionError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => f64::NAN,
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::TypeMismatch {
            expected: "finite number".to_string(),
            found: result.to_string(),
        })
}

fn as_bool(value: &Value) -> Result<bool, ExpressionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(ExpressionError::type_mismatch("boolean", other)),
    }
}

/// Equality with numbers compared by value, so `5 == 5.0`
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => l == r,
    }
}

/// Ordering for relational operators; null sorts before everything
fn compare(l: &Value, r: &Value) -> Result<Ordering, ExpressionError> {
    match (l, r) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Null, _) => Ok(Ordering::Less),
        (_, Value::Null) => Ok(Ordering::Greater),
        (Value::Number(_), Value::Number(_)) => {
            let (a, b) = (number(l)?, number(r)?);
            if let (Num::Int(x), Num::Int(y)) = (a, b) {
                return Ok(x.cmp(&y));
            }
            a.as_f64()
                .partial_cmp(&b.as_f64())
                .ok_or_else(|| ExpressionError::type_mismatch("comparable number", l))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::TypeMismatch {
            expected: format!("values comparable with {}", type_name(l)),
            found: type_name(r).to_string(),
        }),
    }
}

/// String rendering used by concatenation and `toString()`
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
