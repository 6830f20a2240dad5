//! Per-invocation operation contexts
//!
//! One [`CacheOperationContext`] exists per operation for the duration of a
//! single intercepted call. It owns the caches resolved for the call and
//! memoizes the condition outcome and the computed keys.

use super::key::CacheKey;
use super::metadata::OperationMetadata;
use super::method::Target;
use super::operation::{CacheOperation, OperationKind};
use super::resolver::OperationInvocation;
use crate::cache::Cache;
use crate::error::{CacheAspectError, Result};
use crate::expression::{EvaluationContext, ExpressionEvaluator, ResultState};
use serde_json::Value;
use std::cell::OnceCell;
use std::sync::Arc;

pub(crate) struct CacheOperationContext<'a> {
    metadata: Arc<OperationMetadata>,
    target: &'a Target,
    args: &'a [Value],
    evaluator: &'a dyn ExpressionEvaluator,
    caches: Vec<Arc<dyn Cache>>,
    cache_names: Vec<String>,
    condition_passing: OnceCell<bool>,
    key_without_result: OnceCell<CacheKey>,
    key_with_result: OnceCell<CacheKey>,
}

impl<'a> CacheOperationContext<'a> {
    /// Resolve the caches for this call. Resolving none is a configuration
    /// error.
    pub(crate) fn new(
        metadata: Arc<OperationMetadata>,
        target: &'a Target,
        args: &'a [Value],
        evaluator: &'a dyn ExpressionEvaluator,
    ) -> Result<Self> {
        let invocation = OperationInvocation {
            operation: &metadata.operation,
            target,
            method: &metadata.method,
            args,
        };
        let caches = metadata.cache_resolver.resolve_caches(&invocation)?;
        if caches.is_empty() {
            return Err(CacheAspectError::configuration(format!(
                "No cache could be resolved for '{}' using resolver '{:?}'. \
                 At least one cache should be provided per cache operation.",
                metadata.operation, metadata.cache_resolver
            )));
        }
        let cache_names = caches.iter().map(|cache| cache.name().to_string()).collect();

        Ok(Self {
            metadata,
            target,
            args,
            evaluator,
            caches,
            cache_names,
            condition_passing: OnceCell::new(),
            key_without_result: OnceCell::new(),
            key_with_result: OnceCell::new(),
        })
    }

    pub(crate) fn operation(&self) -> &CacheOperation {
        &self.metadata.operation
    }

    pub(crate) fn caches(&self) -> &[Arc<dyn Cache>] {
        &self.caches
    }

    fn evaluation_context<'r>(&'r self, result: ResultState<'r>) -> EvaluationContext<'r> {
        EvaluationContext {
            method: &self.metadata.method,
            target_method: &self.metadata.target_method,
            target: self.target,
            args: self.args,
            cache_names: &self.cache_names,
            result,
        }
    }

    /// Evaluate the condition once per call; later calls reuse the first
    /// outcome whatever `result` they pass. An evaluation error is not
    /// memoized.
    pub(crate) fn is_condition_passing(&self, result: ResultState<'_>) -> Result<bool> {
        if let Some(passing) = self.condition_passing.get() {
            return Ok(*passing);
        }
        let passing = match self.operation().condition() {
            Some(condition) => self.evaluator.condition(
                condition,
                &self.metadata.element,
                &self.evaluation_context(result),
            )?,
            None => true,
        };
        Ok(*self.condition_passing.get_or_init(|| passing))
    }

    /// Whether the `unless` veto allows storing `result`
    pub(crate) fn can_put(&self, result: ResultState<'_>) -> Result<bool> {
        match self.operation().unless() {
            Some(unless) => Ok(!self.evaluator.unless(
                unless,
                &self.metadata.element,
                &self.evaluation_context(result),
            )?),
            None => Ok(true),
        }
    }

    /// The key for this operation, from its key expression or its key
    /// generator. Memoized separately for calls with and without a result.
    pub(crate) fn generate_key(&self, result: ResultState<'_>) -> Result<CacheKey> {
        let memo = match result {
            ResultState::NoResult | ResultState::Unavailable => &self.key_without_result,
            ResultState::Available(_) => &self.key_with_result,
        };
        if let Some(key) = memo.get() {
            return Ok(key.clone());
        }

        let key = match self.operation().key() {
            Some(expression) => CacheKey::from(self.evaluator.key(
                expression,
                &self.metadata.element,
                &self.evaluation_context(result),
            )?),
            None => self
                .metadata
                .key_generator
                .generate(self.target, &self.metadata.method, self.args),
        };
        if key.is_null() {
            return Err(CacheAspectError::invalid_argument(format!(
                "Null key returned for cache operation {}",
                self.operation()
            )));
        }
        Ok(memo.get_or_init(|| key).clone())
    }
}

/// The contexts of one call, grouped by operation kind in declaration order.
pub(crate) struct CacheOperationContexts<'a> {
    pub(crate) cacheable: Vec<CacheOperationContext<'a>>,
    pub(crate) puts: Vec<CacheOperationContext<'a>>,
    pub(crate) evicts: Vec<CacheOperationContext<'a>>,
    sync: bool,
}

impl<'a> CacheOperationContexts<'a> {
    pub(crate) fn new(contexts: Vec<CacheOperationContext<'a>>, method_name: &str) -> Result<Self> {
        let mut grouped = Self {
            cacheable: Vec::new(),
            puts: Vec::new(),
            evicts: Vec::new(),
            sync: false,
        };
        for context in contexts {
            match context.operation().kind() {
                OperationKind::Cacheable { .. } => grouped.cacheable.push(context),
                OperationKind::Put { .. } => grouped.puts.push(context),
                OperationKind::Evict { .. } => grouped.evicts.push(context),
            }
        }
        grouped.sync = grouped.determine_sync(method_name)?;
        Ok(grouped)
    }

    pub(crate) fn is_synchronized(&self) -> bool {
        self.sync
    }

    /// A synchronized read must be the only operation on the method, use a
    /// single cache and have no `unless`.
    fn determine_sync(&self, method_name: &str) -> Result<bool> {
        if !self
            .cacheable
            .iter()
            .any(|context| context.operation().kind().is_sync())
        {
            return Ok(false);
        }
        if !self.puts.is_empty() || !self.evicts.is_empty() {
            return Err(CacheAspectError::configuration(format!(
                "A sync=true operation cannot be combined with other cache operations on '{method_name}'"
            )));
        }
        if self.cacheable.len() > 1 {
            return Err(CacheAspectError::configuration(format!(
                "Only one sync=true operation is allowed on '{method_name}'"
            )));
        }
        let context = &self.cacheable[0];
        let operation = context.operation();
        if context.caches().len() > 1 {
            return Err(CacheAspectError::configuration(format!(
                "A sync=true operation only allows a single cache on '{operation}'"
            )));
        }
        if operation.unless().is_some() {
            return Err(CacheAspectError::configuration(format!(
                "A sync=true operation does not support the unless attribute on '{operation}'"
            )));
        }
        Ok(true)
    }
}
