//! Operation source keyed by method name patterns
//!
//! Patterns are method names with `*` wildcards (`get*`, `*Cached`,
//! `load*ById`). An exact name wins; otherwise the longest matching pattern
//! does.

use super::{no_operations, CacheOperationSource, Operations};
use crate::error::Result;
use crate::interceptor::method::{MethodRef, TypeDescriptor};
use crate::interceptor::operation::{CacheOperation, CacheOperationBuilder};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct NameMatchCacheOperationSource {
    patterns: RwLock<HashMap<String, Operations>>,
}

impl NameMatchCacheOperationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register operations for methods whose name matches `pattern`.
    /// Unnamed operations are named after the pattern.
    pub fn add_method<I>(&self, pattern: impl Into<String>, operations: I) -> Result<()>
    where
        I: IntoIterator<Item = CacheOperationBuilder>,
    {
        let pattern = pattern.into();
        let ops = operations
            .into_iter()
            .map(|builder| {
                let builder = if builder.has_name() {
                    builder
                } else {
                    builder.name(pattern.clone())
                };
                builder.build().map(Arc::new)
            })
            .collect::<Result<Vec<Arc<CacheOperation>>>>()?;
        debug!(pattern = %pattern, operations = ops.len(), "Adding method pattern");
        self.patterns.write().insert(pattern, Arc::from(ops));
        Ok(())
    }

    fn lookup(&self, method_name: &str) -> Option<Operations> {
        let patterns = self.patterns.read();
        if let Some(ops) = patterns.get(method_name) {
            return Some(ops.clone());
        }
        let mut best: Option<(&String, &Operations)> = None;
        for (pattern, ops) in patterns.iter() {
            if !simple_match(pattern, method_name) {
                continue;
            }
            // HashMap order is arbitrary; break length ties by pattern text
            let better = match best {
                None => true,
                Some((current, _)) => {
                    pattern.len() > current.len()
                        || (pattern.len() == current.len() && pattern < current)
                }
            };
            if better {
                best = Some((pattern, ops));
            }
        }
        best.map(|(pattern, ops)| {
            trace!(method = method_name, pattern = %pattern, "Matched method pattern");
            ops.clone()
        })
    }
}

impl CacheOperationSource for NameMatchCacheOperationSource {
    fn operations_for(&self, method: &MethodRef, _target_type: &Arc<TypeDescriptor>) -> Operations {
        self.lookup(method.name()).unwrap_or_else(no_operations)
    }
}

/// Match `text` against `pattern`, where `*` matches any run of characters.
pub(crate) fn simple_match(pattern: &str, text: &str) -> bool {
    let Some(first_star) = pattern.find('*') else {
        return pattern == text;
    };
    let (prefix, rest) = pattern.split_at(first_star);
    if !text.starts_with(prefix) {
        return false;
    }
    let mut remaining = &text[prefix.len()..];

    let parts: Vec<&str> = rest.split('*').collect();
    // parts[0] is always empty since `rest` starts with '*'
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate().skip(1) {
        if part.is_empty() {
            continue;
        }
        if i == last {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    true
}
