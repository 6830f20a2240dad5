#![allow(dead_code)]

use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating scalar JSON arguments
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
    ]
}

/// Strategy for generating argument lists of up to four values, nulls and
/// small arrays included
pub fn args_strategy() -> impl Strategy<Value = Vec<Value>> {
    let arg = prop_oneof![
        4 => scalar_strategy(),
        1 => Just(Value::Null),
        1 => prop::collection::vec(scalar_strategy(), 0..3).prop_map(Value::Array),
    ];
    prop::collection::vec(arg, 0..4)
}

/// Strategy for generating cache names
pub fn cache_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Strategy for method-name wildcard patterns and names they must match
pub fn matching_pattern_strategy() -> impl Strategy<Value = (String, String)> {
    ("[a-z]{0,4}", "[a-zA-Z]{0,6}", "[a-z]{0,4}").prop_map(|(prefix, middle, suffix)| {
        (format!("{prefix}*{suffix}"), format!("{prefix}{middle}{suffix}"))
    })
}
