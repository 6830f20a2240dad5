//! Shared fixtures: a book service type, an executor harness that counts
//! invocations, and caches that record or fail their calls.

#![allow(dead_code)] // Not every test binary uses every fixture

use cache_aspect::cache::{
    Cache, CacheError, CacheManager, CacheResult, ConcurrentMapCache, ConcurrentMapCacheManager,
    ValueLoader,
};
use cache_aspect::interceptor::{
    CacheErrorHandler, CacheKey, CacheOperationBuilder, CacheOperationExecutor,
    DeclaredOperations, FallbackCacheOperationSource, InvocationError, MethodBuilder, MethodRef,
    NamedComponents, Target, TypeDescriptor,
};
use cache_aspect::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `BookService` with the methods the tests declare operations on
pub fn book_service() -> Arc<TypeDescriptor> {
    TypeDescriptor::class("BookService")
        .method(MethodBuilder::public("find").param("id", "i64"))
        .method(
            MethodBuilder::public("find_by")
                .param("isbn", "String")
                .param("edition", "i64"),
        )
        .method(MethodBuilder::public("all"))
        .method(MethodBuilder::public("update").param("id", "i64").param("book", "Book"))
        .method(MethodBuilder::public("remove").param("id", "i64"))
        .method(MethodBuilder::public("reload"))
        .method(
            MethodBuilder::public("tagged")
                .param("prefix", "String")
                .param("tags", "String[]")
                .varargs(),
        )
        .method(MethodBuilder::private("internal").param("id", "i64"))
        .build()
}

pub struct HarnessBuilder {
    ty: Arc<TypeDescriptor>,
    declared: DeclaredOperations,
    manager: Arc<ConcurrentMapCacheManager>,
    cache_manager: Option<Arc<dyn CacheManager>>,
    error_handler: Option<Arc<dyn CacheErrorHandler>>,
    components: Option<Arc<NamedComponents>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self::for_type(book_service())
    }

    pub fn for_type(ty: Arc<TypeDescriptor>) -> Self {
        Self {
            ty,
            declared: DeclaredOperations::new(),
            manager: Arc::new(ConcurrentMapCacheManager::new()),
            cache_manager: None,
            error_handler: None,
            components: None,
        }
    }

    pub fn declare<I>(self, method: &str, operations: I) -> Self
    where
        I: IntoIterator<Item = CacheOperationBuilder>,
    {
        let method = self
            .ty
            .method(method)
            .unwrap_or_else(|| panic!("no method {method} on {}", self.ty));
        self.declared
            .declare_method(&method, operations)
            .expect("valid declaration");
        self
    }

    /// Serve caches from `manager` instead of the harness map manager
    pub fn cache_manager(mut self, manager: Arc<dyn CacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn CacheErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn components(mut self, components: Arc<NamedComponents>) -> Self {
        self.components = Some(components);
        self
    }

    pub fn build(self) -> Harness {
        let manager: Arc<dyn CacheManager> = self
            .cache_manager
            .unwrap_or_else(|| self.manager.clone() as Arc<dyn CacheManager>);
        let mut builder = CacheOperationExecutor::builder()
            .operation_source(Arc::new(FallbackCacheOperationSource::new(self.declared)))
            .cache_manager(manager);
        if let Some(handler) = self.error_handler {
            builder = builder.error_handler(handler);
        }
        if let Some(components) = self.components {
            builder = builder.components(components);
        }
        Harness {
            executor: Arc::new(builder.build().expect("executor")),
            target: Target::of(self.ty.clone()),
            ty: self.ty,
            manager: self.manager,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An executor wired to a map-backed cache manager plus an invocation counter
#[derive(Clone)]
pub struct Harness {
    pub executor: Arc<CacheOperationExecutor>,
    pub ty: Arc<TypeDescriptor>,
    pub target: Target,
    pub manager: Arc<ConcurrentMapCacheManager>,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    pub fn method(&self, name: &str) -> MethodRef {
        self.ty.method(name).expect("method declared on fixture type")
    }

    /// Call `method`, counting the invocation and returning `result` from it
    pub fn call(&self, method: &str, args: Vec<Value>, result: Value) -> Result<Value> {
        self.call_with(method, args, move || Ok(result))
    }

    pub fn call_with<F>(&self, method: &str, args: Vec<Value>, invoke: F) -> Result<Value>
    where
        F: FnOnce() -> std::result::Result<Value, InvocationError>,
    {
        let method = self.method(method);
        let calls = self.calls.clone();
        self.executor.execute(
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                invoke()
            },
            &self.target,
            &method,
            args,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The named cache, created on demand
    pub fn cache(&self, name: &str) -> Arc<ConcurrentMapCache> {
        self.manager.get_cache(name);
        self.manager.cache(name).expect("dynamic manager creates caches")
    }

    pub fn cached(&self, cache: &str, key: impl Into<CacheKey>) -> Option<Value> {
        self.cache(cache).get(&key.into()).expect("map cache get")
    }
}

/// Which calls a [`FailingCache`] fails
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub get: bool,
    pub put: bool,
    pub evict: bool,
    pub clear: bool,
}

impl Failures {
    pub fn all() -> Self {
        Self {
            get: true,
            put: true,
            evict: true,
            clear: true,
        }
    }
}

/// A map cache whose selected operations fail, recording every call
#[derive(Debug)]
pub struct FailingCache {
    inner: ConcurrentMapCache,
    failures: Failures,
    log: Mutex<Vec<String>>,
}

impl FailingCache {
    pub fn new(name: &str, failures: Failures) -> Self {
        Self {
            inner: ConcurrentMapCache::new(name),
            failures,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn record(&self, call: String, fail: bool) -> CacheResult<()> {
        self.log.lock().push(call.clone());
        if fail {
            Err(CacheError::backend(self.inner.name(), call))
        } else {
            Ok(())
        }
    }
}

impl Cache for FailingCache {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &CacheKey) -> CacheResult<Option<Value>> {
        self.record(format!("get {key}"), self.failures.get)?;
        self.inner.get(key)
    }

    fn get_or_compute(&self, key: &CacheKey, loader: ValueLoader<'_>) -> CacheResult<Value> {
        self.record(format!("get_or_compute {key}"), self.failures.get)?;
        self.inner.get_or_compute(key, loader)
    }

    fn put(&self, key: &CacheKey, value: Value) -> CacheResult<()> {
        self.record(format!("put {key}"), self.failures.put)?;
        self.inner.put(key, value)
    }

    fn evict(&self, key: &CacheKey) -> CacheResult<()> {
        self.record(format!("evict {key}"), self.failures.evict)?;
        self.inner.evict(key)
    }

    fn evict_if_present(&self, key: &CacheKey) -> CacheResult<bool> {
        self.record(format!("evict_if_present {key}"), self.failures.evict)?;
        self.inner.evict_if_present(key)
    }

    fn clear(&self) -> CacheResult<()> {
        self.record("clear".to_string(), self.failures.clear)?;
        self.inner.clear()
    }

    fn invalidate(&self) -> CacheResult<bool> {
        self.record("invalidate".to_string(), self.failures.clear)?;
        self.inner.invalidate()
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }
}

/// Manager over a fixed set of caches
#[derive(Debug, Default)]
pub struct FixedCacheManager {
    caches: Vec<Arc<dyn Cache>>,
}

impl FixedCacheManager {
    pub fn new(caches: Vec<Arc<dyn Cache>>) -> Self {
        Self { caches }
    }
}

impl CacheManager for FixedCacheManager {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        self.caches.iter().find(|cache| cache.name() == name).cloned()
    }

    fn cache_names(&self) -> Vec<String> {
        self.caches.iter().map(|cache| cache.name().to_string()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("book {0} not found")]
pub struct BookNotFound(pub i64);
