//! Cache keys and key generation

use super::method::{MethodRef, Target};
use serde_json::Value;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Key under which a value is stored in a [`Cache`](crate::cache::Cache).
///
/// Either a single JSON value (the usual result of a key expression or of a
/// one-argument method) or a [`SimpleKey`] composed of several values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    Value(Value),
    Simple(SimpleKey),
}

impl CacheKey {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    /// The key as a single JSON value, composite keys becoming arrays
    pub fn to_value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Simple(key) => Value::Array(key.params.clone()),
        }
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Value(value) => {
                0u8.hash(state);
                hash_value(value, state);
            }
            Self::Simple(key) => {
                1u8.hash(state);
                key.hash.hash(state);
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(Value::String(s)) => f.write_str(s),
            Self::Value(value) => write!(f, "{value}"),
            Self::Simple(key) => write!(f, "{key}"),
        }
    }
}

impl From<Value> for CacheKey {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<SimpleKey> for CacheKey {
    fn from(key: SimpleKey) -> Self {
        Self::Simple(key)
    }
}

/// Composite key over an ordered list of parameters.
///
/// The hash is computed once at construction; equality compares the
/// parameters element by element.
#[derive(Debug, Clone)]
pub struct SimpleKey {
    params: Vec<Value>,
    hash: u64,
}

impl SimpleKey {
    pub fn new(params: Vec<Value>) -> Self {
        let mut hasher = DefaultHasher::new();
        params.len().hash(&mut hasher);
        for param in &params {
            hash_value(param, &mut hasher);
        }
        Self {
            hash: hasher.finish(),
            params,
        }
    }

    /// Key used for methods without parameters
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl PartialEq for SimpleKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.params == other.params
    }
}

impl Eq for SimpleKey {}

impl Hash for SimpleKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Display for SimpleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SimpleKey [")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str("]")
    }
}

/// Structural hash over a JSON value, consistent with `Value`'s equality.
pub(crate) fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            if let Some(u) = n.as_u64() {
                0u8.hash(state);
                u.hash(state);
            } else if let Some(i) = n.as_i64() {
                1u8.hash(state);
                i.hash(state);
            } else if let Some(f) = n.as_f64() {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            for (k, v) in map {
                k.hash(state);
                hash_value(v, state);
            }
        }
    }
}

/// Computes a cache key from the invocation when an operation declares no
/// key expression.
pub trait KeyGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, target: &Target, method: &MethodRef, args: &[Value]) -> CacheKey;
}

/// Default key generator.
///
/// No arguments yield [`SimpleKey::empty`], a single non-null, non-array
/// argument is used as the key itself, anything else becomes a
/// [`SimpleKey`] over all arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleKeyGenerator;

impl SimpleKeyGenerator {
    pub fn generate_key(args: &[Value]) -> CacheKey {
        match args {
            [] => CacheKey::Simple(SimpleKey::empty()),
            [single] if !single.is_null() && !single.is_array() => {
                CacheKey::Value(single.clone())
            }
            _ => CacheKey::Simple(SimpleKey::new(args.to_vec())),
        }
    }
}

impl KeyGenerator for SimpleKeyGenerator {
    fn generate(&self, _target: &Target, _method: &MethodRef, args: &[Value]) -> CacheKey {
        Self::generate_key(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_no_args_yield_empty_key() {
        assert_eq!(
            SimpleKeyGenerator::generate_key(&[]),
            CacheKey::Simple(SimpleKey::empty())
        );
    }

    #[test]
    fn test_single_plain_arg_is_the_key() {
        assert_eq!(
            SimpleKeyGenerator::generate_key(&[json!(5)]),
            CacheKey::from(json!(5))
        );
        assert_eq!(
            SimpleKeyGenerator::generate_key(&[json!("abc")]),
            CacheKey::from("abc")
        );
    }

    #[test]
    fn test_single_null_or_array_arg_is_wrapped() {
        assert_eq!(
            SimpleKeyGenerator::generate_key(&[Value::Null]),
            CacheKey::Simple(SimpleKey::new(vec![Value::Null]))
        );
        assert_eq!(
            SimpleKeyGenerator::generate_key(&[json!([1, 2])]),
            CacheKey::Simple(SimpleKey::new(vec![json!([1, 2])]))
        );
    }

    #[test]
    fn test_simple_keys_equal_by_params() {
        let a = SimpleKey::new(vec![json!(1), json!("x")]);
        let b = SimpleKey::new(vec![json!(1), json!("x")]);
        let c = SimpleKey::new(vec![json!("x"), json!(1)]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<CacheKey> = [a.into(), b.into(), c.into()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        let key = SimpleKey::new(vec![json!(1), json!("x")]);
        assert_eq!(key.to_string(), r#"SimpleKey [1,"x"]"#);
        assert_eq!(CacheKey::from("plain").to_string(), "plain");
        assert_eq!(CacheKey::from(json!(5)).to_string(), "5");
    }

    #[test]
    fn test_integer_and_float_keys_differ() {
        assert_ne!(CacheKey::from(json!(5)), CacheKey::from(json!(5.0)));
    }
}
