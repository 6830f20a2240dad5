//! Programmatic operation declarations
//!
//! Operations are registered against methods or whole types, the same way
//! attributes would be attached to them in source. Each operation is named
//! after the element it is declared on, receives the declaring type's
//! [`CacheDefaults`] and is validated at registration time.

use super::{OperationMetadataProvider, Operations};
use crate::error::Result;
use crate::interceptor::method::{Method, MethodKey};
use crate::interceptor::operation::{CacheDefaults, CacheOperation, CacheOperationBuilder};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DeclaredOperations {
    defaults: DashMap<String, CacheDefaults>,
    methods: DashMap<MethodKey, Operations>,
    types: DashMap<String, Operations>,
}

impl DeclaredOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for operations declared on `type_name` afterwards.
    pub fn declare_defaults(&self, type_name: impl Into<String>, defaults: CacheDefaults) {
        self.defaults.insert(type_name.into(), defaults);
    }

    /// Attach operations to a method, replacing earlier declarations.
    pub fn declare_method<I>(&self, method: &Method, operations: I) -> Result<()>
    where
        I: IntoIterator<Item = CacheOperationBuilder>,
    {
        let ops = self.build_all(method.declaring_type(), &method.to_string(), operations)?;
        if ops.is_empty() {
            return Ok(());
        }
        debug!(method = %method, operations = ops.len(), "Declared method cache operations");
        self.methods.insert(method.key(), ops);
        Ok(())
    }

    /// Attach operations to every method of a type.
    pub fn declare_type<I>(&self, type_name: &str, operations: I) -> Result<()>
    where
        I: IntoIterator<Item = CacheOperationBuilder>,
    {
        let ops = self.build_all(type_name, type_name, operations)?;
        if ops.is_empty() {
            return Ok(());
        }
        debug!(type_name, operations = ops.len(), "Declared type cache operations");
        self.types.insert(type_name.to_string(), ops);
        Ok(())
    }

    fn build_all<I>(&self, type_name: &str, element: &str, operations: I) -> Result<Operations>
    where
        I: IntoIterator<Item = CacheOperationBuilder>,
    {
        let defaults = self
            .defaults
            .get(type_name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        let ops = operations
            .into_iter()
            .map(|builder| {
                let builder = if builder.has_name() {
                    builder
                } else {
                    builder.name(element)
                };
                builder.apply_defaults(&defaults).build().map(Arc::new)
            })
            .collect::<Result<Vec<Arc<CacheOperation>>>>()?;
        Ok(Arc::from(ops))
    }
}

impl OperationMetadataProvider for DeclaredOperations {
    fn method_operations(&self, method: &Method) -> Option<Operations> {
        self.methods.get(&method.key()).map(|entry| entry.value().clone())
    }

    fn type_operations(&self, type_name: &str) -> Option<Operations> {
        self.types.get(type_name).map(|entry| entry.value().clone())
    }
}
