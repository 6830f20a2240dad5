//! # Cache Operation Executor
//!
//! Drives one intercepted call through its cache operations:
//!
//! 1. Synchronized reads (`sync = true`) are delegated to the single cache's
//!    [`get_or_compute`](crate::cache::Cache::get_or_compute) and return.
//! 2. Evictions marked `before_invocation` run, immediately.
//! 3. Cacheable operations are looked up; the first hit wins.
//! 4. A hit with no effective put is returned without calling the method.
//!    Otherwise the method is called exactly once.
//! 5. Pending writes (misses and puts) are applied unless vetoed.
//! 6. Remaining evictions run.
//!
//! Cache backend errors go through the [`CacheErrorHandler`]; expression,
//! configuration and invocation errors abort the call. An invocation error
//! is returned unchanged and nothing is cached for it.

use super::components::NamedComponents;
use super::context::{CacheOperationContext, CacheOperationContexts};
use super::error_handler::{CacheErrorHandler, LoggingCacheErrorHandler, SimpleCacheErrorHandler};
use super::invoker::{CacheInvoker, InvocationError};
use super::key::{CacheKey, KeyGenerator, SimpleKeyGenerator};
use super::metadata::{OperationMetadata, OperationMetadataCache};
use super::method::{ElementKey, MethodRef, Target};
use super::operation::{CacheOperation, OperationKind};
use super::resolver::{CacheResolver, SimpleCacheResolver};
use super::source::{
    CacheOperationSource, FallbackCacheOperationSource, OperationMetadataProvider,
};
use crate::cache::{build_cache_manager, CacheError, CacheManager};
use crate::config::{CachingSettings, ErrorHandlingMode};
use crate::error::{CacheAspectError, Result};
use crate::expression::{ExpressionEvaluator, ResultState, CachingExpressionEvaluator};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// A write to perform once the result is known
struct PutRequest<'c, 'a> {
    context: &'c CacheOperationContext<'a>,
    key: CacheKey,
}

#[derive(Debug)]
pub struct CacheOperationExecutor {
    operation_source: Arc<dyn CacheOperationSource>,
    cache_resolver: Arc<dyn CacheResolver>,
    key_generator: Arc<dyn KeyGenerator>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    invoker: CacheInvoker,
    components: Arc<NamedComponents>,
    metadata_cache: OperationMetadataCache,
}

impl CacheOperationExecutor {
    pub fn builder() -> CacheOperationExecutorBuilder {
        CacheOperationExecutorBuilder::default()
    }

    /// Wire an executor from settings: a fallback source over `provider`,
    /// the configured cache manager and error handling mode.
    pub fn from_settings<P>(settings: &CachingSettings, provider: P) -> Result<Self>
    where
        P: OperationMetadataProvider + 'static,
    {
        settings.validate()?;
        let source = FallbackCacheOperationSource::new(provider)
            .public_methods_only(settings.public_methods_only);
        let error_handler: Arc<dyn CacheErrorHandler> = match settings.error_handler {
            ErrorHandlingMode::Rethrow => Arc::new(SimpleCacheErrorHandler),
            ErrorHandlingMode::Log => Arc::new(LoggingCacheErrorHandler),
        };
        info!(
            backend = %settings.cache_manager.backend,
            error_handler = ?settings.error_handler,
            public_methods_only = settings.public_methods_only,
            "Configuring cache operation executor"
        );
        Self::builder()
            .operation_source(Arc::new(source))
            .cache_manager(build_cache_manager(&settings.cache_manager))
            .error_handler(error_handler)
            .build()
    }

    pub fn operation_source(&self) -> &Arc<dyn CacheOperationSource> {
        &self.operation_source
    }

    pub fn components(&self) -> &Arc<NamedComponents> {
        &self.components
    }

    /// Run `invoke` for `method` on `target`, applying the operations the
    /// source reports for it. Without operations `invoke` is simply called.
    pub fn execute<F>(&self, invoke: F, target: &Target, method: &MethodRef, args: Vec<Value>) -> Result<Value>
    where
        F: FnOnce() -> std::result::Result<Value, InvocationError>,
    {
        let operations = self.operation_source.operations_for(method, target.target_type());
        self.execute_operations(invoke, target, method, args, &operations)
    }

    /// Like [`execute`](Self::execute) with an explicit operation list.
    pub fn execute_operations<F>(
        &self,
        invoke: F,
        target: &Target,
        method: &MethodRef,
        args: Vec<Value>,
        operations: &[Arc<CacheOperation>],
    ) -> Result<Value>
    where
        F: FnOnce() -> std::result::Result<Value, InvocationError>,
    {
        if operations.is_empty() {
            return invoke().map_err(CacheAspectError::Invocation);
        }

        let args = expand_varargs(method, args);
        let contexts = operations
            .iter()
            .map(|operation| {
                let metadata = self.operation_metadata(operation, method, target)?;
                CacheOperationContext::new(metadata, target, &args, self.evaluator.as_ref())
            })
            .collect::<Result<Vec<_>>>()?;
        let contexts = CacheOperationContexts::new(contexts, &method.to_string())?;

        self.run(invoke, &contexts)
    }

    /// Drop cached operation metadata, compiled expressions and the
    /// operation source's memoized lookups
    pub fn clear_metadata_cache(&self) {
        self.operation_source.clear();
        self.metadata_cache.clear();
        self.evaluator.clear();
        debug!("Cleared cache operation metadata");
    }

    pub fn metadata_cache_len(&self) -> usize {
        self.metadata_cache.len()
    }

    fn operation_metadata(
        &self,
        operation: &Arc<CacheOperation>,
        method: &MethodRef,
        target: &Target,
    ) -> Result<Arc<OperationMetadata>> {
        let target_type = target.target_type();
        self.metadata_cache
            .get_or_try_insert(operation, method, target_type, || {
                let key_generator = match operation.key_generator() {
                    Some(name) => self.components.key_generator(name)?,
                    None => self.key_generator.clone(),
                };
                let cache_resolver: Arc<dyn CacheResolver> =
                    match (operation.cache_resolver(), operation.cache_manager()) {
                        (Some(name), _) => self.components.cache_resolver(name)?,
                        (None, Some(name)) => {
                            Arc::new(SimpleCacheResolver::new(self.components.cache_manager(name)?))
                        }
                        (None, None) => self.cache_resolver.clone(),
                    };
                let target_method = target_type.most_specific_method(method);
                let element = ElementKey::new(&target_method, target_type);
                Ok(OperationMetadata {
                    operation: operation.clone(),
                    method: method.clone(),
                    target_type: target_type.clone(),
                    target_method,
                    element,
                    key_generator,
                    cache_resolver,
                })
            })
    }

    fn run<F>(&self, invoke: F, contexts: &CacheOperationContexts<'_>) -> Result<Value>
    where
        F: FnOnce() -> std::result::Result<Value, InvocationError>,
    {
        if contexts.is_synchronized() {
            return self.run_synchronized(invoke, &contexts.cacheable[0]);
        }

        self.process_cache_evicts(&contexts.evicts, true, ResultState::NoResult)?;

        let cache_hit = self.find_cached_value(&contexts.cacheable)?;

        let mut put_requests = Vec::new();
        if cache_hit.is_none() {
            self.collect_put_requests(&contexts.cacheable, ResultState::NoResult, &mut put_requests)?;
        }

        let value = match cache_hit {
            Some(hit) if !self.has_cache_put(contexts)? => hit,
            _ => invoke().map_err(CacheAspectError::Invocation)?,
        };

        self.collect_put_requests(&contexts.puts, ResultState::Available(&value), &mut put_requests)?;
        for request in &put_requests {
            self.apply_put(request, &value)?;
        }

        self.process_cache_evicts(&contexts.evicts, false, ResultState::Available(&value))?;
        Ok(value)
    }

    fn run_synchronized<F>(&self, invoke: F, context: &CacheOperationContext<'_>) -> Result<Value>
    where
        F: FnOnce() -> std::result::Result<Value, InvocationError>,
    {
        if !context.is_condition_passing(ResultState::NoResult)? {
            return invoke().map_err(CacheAspectError::Invocation);
        }
        let key = context.generate_key(ResultState::NoResult)?;
        let cache = &context.caches()[0];
        trace!(cache = cache.name(), key = %key, "Synchronized cache lookup");
        match cache.get_or_compute(&key, Box::new(invoke)) {
            Ok(value) => Ok(value),
            Err(CacheError::ValueRetrieval { source, .. }) => Err(CacheAspectError::Invocation(source)),
            Err(other) => Err(other.into()),
        }
    }

    fn find_cached_value(&self, contexts: &[CacheOperationContext<'_>]) -> Result<Option<Value>> {
        for context in contexts {
            if !context.is_condition_passing(ResultState::NoResult)? {
                continue;
            }
            let key = context.generate_key(ResultState::NoResult)?;
            if let Some(hit) = self.find_in_caches(context, &key)? {
                return Ok(Some(hit));
            }
            trace!(
                key = %key,
                caches = ?context.operation().cache_names(),
                "No cache entry for key"
            );
        }
        Ok(None)
    }

    fn find_in_caches(&self, context: &CacheOperationContext<'_>, key: &CacheKey) -> Result<Option<Value>> {
        for cache in context.caches() {
            if let Some(value) = self.invoker.do_get(cache.as_ref(), key)? {
                debug!(cache = cache.name(), key = %key, "Cache entry found");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Whether any put operation will run once the result is known. Puts
    /// whose condition needs the result count as effective.
    fn has_cache_put(&self, contexts: &CacheOperationContexts<'_>) -> Result<bool> {
        let mut effective = false;
        for context in &contexts.puts {
            match context.is_condition_passing(ResultState::Unavailable) {
                Ok(passing) => effective |= passing,
                Err(error) if error.is_variable_not_available() => effective = true,
                Err(error) => return Err(error),
            }
        }
        Ok(effective)
    }

    fn collect_put_requests<'c, 'a>(
        &self,
        contexts: &'c [CacheOperationContext<'a>],
        result: ResultState<'_>,
        requests: &mut Vec<PutRequest<'c, 'a>>,
    ) -> Result<()> {
        for context in contexts {
            if context.is_condition_passing(result)? {
                let key = context.generate_key(result)?;
                requests.push(PutRequest { context, key });
            }
        }
        Ok(())
    }

    fn apply_put(&self, request: &PutRequest<'_, '_>, value: &Value) -> Result<()> {
        if !request.context.can_put(ResultState::Available(value))? {
            trace!(key = %request.key, "Put vetoed by unless");
            return Ok(());
        }
        for cache in request.context.caches() {
            trace!(cache = cache.name(), key = %request.key, "Cache put");
            self.invoker.do_put(cache.as_ref(), &request.key, value)?;
        }
        Ok(())
    }

    fn process_cache_evicts(
        &self,
        contexts: &[CacheOperationContext<'_>],
        before_invocation: bool,
        result: ResultState<'_>,
    ) -> Result<()> {
        for context in contexts {
            let OperationKind::Evict {
                all_entries,
                before_invocation: before,
            } = *context.operation().kind()
            else {
                continue;
            };
            if before != before_invocation || !context.is_condition_passing(result)? {
                continue;
            }
            self.perform_evict(context, all_entries, before_invocation, result)?;
        }
        Ok(())
    }

    fn perform_evict(
        &self,
        context: &CacheOperationContext<'_>,
        all_entries: bool,
        immediate: bool,
        result: ResultState<'_>,
    ) -> Result<()> {
        for cache in context.caches() {
            if all_entries {
                trace!(cache = cache.name(), operation = %context.operation(), "Invalidating entire cache");
                self.invoker.do_clear(cache.as_ref(), immediate)?;
            } else {
                // memoized by the context, computed at most once
                let key = context.generate_key(result)?;
                trace!(cache = cache.name(), key = %key, operation = %context.operation(), "Invalidating cache key");
                self.invoker.do_evict(cache.as_ref(), &key, immediate)?;
            }
        }
        Ok(())
    }
}

/// Spread a trailing array argument of a variadic method into the argument
/// list.
fn expand_varargs(method: &MethodRef, mut args: Vec<Value>) -> Vec<Value> {
    if method.is_varargs() && matches!(args.last(), Some(Value::Array(_))) {
        if let Some(Value::Array(rest)) = args.pop() {
            args.extend(rest);
        }
    }
    args
}

#[derive(Debug, Default)]
pub struct CacheOperationExecutorBuilder {
    operation_source: Option<Arc<dyn CacheOperationSource>>,
    cache_manager: Option<Arc<dyn CacheManager>>,
    cache_resolver: Option<Arc<dyn CacheResolver>>,
    key_generator: Option<Arc<dyn KeyGenerator>>,
    error_handler: Option<Arc<dyn CacheErrorHandler>>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    components: Option<Arc<NamedComponents>>,
}

impl CacheOperationExecutorBuilder {
    pub fn operation_source(mut self, source: Arc<dyn CacheOperationSource>) -> Self {
        self.operation_source = Some(source);
        self
    }

    /// Default cache manager, used through a [`SimpleCacheResolver`] unless
    /// a resolver is set
    pub fn cache_manager(mut self, manager: Arc<dyn CacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    /// Default cache resolver; takes precedence over `cache_manager`
    pub fn cache_resolver(mut self, resolver: Arc<dyn CacheResolver>) -> Self {
        self.cache_resolver = Some(resolver);
        self
    }

    /// Defaults to [`SimpleKeyGenerator`]
    pub fn key_generator(mut self, generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = Some(generator);
        self
    }

    /// Defaults to [`SimpleCacheErrorHandler`]
    pub fn error_handler(mut self, handler: Arc<dyn CacheErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Defaults to [`CachingExpressionEvaluator`]
    pub fn evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn components(mut self, components: Arc<NamedComponents>) -> Self {
        self.components = Some(components);
        self
    }

    pub fn build(self) -> Result<CacheOperationExecutor> {
        let operation_source = self.operation_source.ok_or_else(|| {
            CacheAspectError::configuration("An operation source is required")
        })?;
        let cache_resolver = match (self.cache_resolver, self.cache_manager) {
            (Some(resolver), _) => resolver,
            (None, Some(manager)) => Arc::new(SimpleCacheResolver::new(manager)),
            (None, None) => {
                return Err(CacheAspectError::configuration(
                    "No cache resolver specified and no cache manager to build one from",
                ))
            }
        };
        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Arc::new(SimpleCacheErrorHandler));

        Ok(CacheOperationExecutor {
            operation_source,
            cache_resolver,
            key_generator: self
                .key_generator
                .unwrap_or_else(|| Arc::new(SimpleKeyGenerator)),
            evaluator: self
                .evaluator
                .unwrap_or_else(|| Arc::new(CachingExpressionEvaluator::new())),
            invoker: CacheInvoker::new(error_handler),
            components: self
                .components
                .unwrap_or_else(|| Arc::new(NamedComponents::new())),
            metadata_cache: OperationMetadataCache::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ConcurrentMapCacheManager;
    use crate::interceptor::{DeclaredOperations, MethodBuilder, TypeDescriptor};
    use serde_json::json;

    #[test]
    fn test_expand_varargs() {
        let ty = TypeDescriptor::class("Svc")
            .method(MethodBuilder::public("tag").param("names", "String[]").varargs())
            .method(MethodBuilder::public("plain").param("names", "String[]"))
            .build();
        let tag = ty.declared_method("tag").unwrap();
        let plain = ty.declared_method("plain").unwrap();

        assert_eq!(
            expand_varargs(&tag, vec![json!("x"), json!(["a", "b"])]),
            vec![json!("x"), json!("a"), json!("b")]
        );
        assert_eq!(expand_varargs(&plain, vec![json!(["a"])]), vec![json!(["a"])]);
        assert_eq!(expand_varargs(&tag, vec![json!("a")]), vec![json!("a")]);
    }

    #[test]
    fn test_builder_requires_source_and_resolver() {
        let err = CacheOperationExecutor::builder()
            .cache_manager(Arc::new(ConcurrentMapCacheManager::new()))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let err = CacheOperationExecutor::builder()
            .operation_source(Arc::new(FallbackCacheOperationSource::new(DeclaredOperations::new())))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_metadata_is_cached_until_cleared() {
        let ty = TypeDescriptor::class("Svc")
            .method(MethodBuilder::public("get").param("id", "i64"))
            .build();
        let get = ty.declared_method("get").unwrap();
        let declared = DeclaredOperations::new();
        declared
            .declare_method(&get, [CacheOperation::cacheable().cache_name("c")])
            .unwrap();
        let source = Arc::new(FallbackCacheOperationSource::new(declared));
        let executor = CacheOperationExecutor::builder()
            .operation_source(source.clone())
            .cache_manager(Arc::new(ConcurrentMapCacheManager::new()))
            .build()
            .unwrap();
        let target = Target::of(ty);

        for id in 0..3 {
            executor
                .execute(|| Ok(json!(id)), &target, &get, vec![json!(id)])
                .unwrap();
        }
        assert_eq!(executor.metadata_cache_len(), 1);
        assert_eq!(source.memoized(), 1);

        executor.clear_metadata_cache();
        assert_eq!(executor.metadata_cache_len(), 0);
        assert_eq!(source.memoized(), 0);
    }
}
