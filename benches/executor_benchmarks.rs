use cache_aspect::cache::ConcurrentMapCacheManager;
use cache_aspect::interceptor::{
    CacheOperation, DeclaredOperations, FallbackCacheOperationSource, MethodBuilder,
    SimpleKeyGenerator, Target, TypeDescriptor,
};
use cache_aspect::CacheOperationExecutor;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;

fn executor(key: Option<&str>) -> (CacheOperationExecutor, Target) {
    let ty = TypeDescriptor::class("BookService")
        .method(MethodBuilder::public("find").param("id", "i64"))
        .build();
    let declared = DeclaredOperations::new();
    let mut op = CacheOperation::cacheable().cache_name("books");
    if let Some(key) = key {
        op = op.key(key);
    }
    declared
        .declare_method(&ty.method("find").expect("find"), [op])
        .expect("declaration");
    let executor = CacheOperationExecutor::builder()
        .operation_source(Arc::new(FallbackCacheOperationSource::new(declared)))
        .cache_manager(Arc::new(ConcurrentMapCacheManager::new()))
        .build()
        .expect("executor");
    (executor, Target::of(ty))
}

fn benchmark_cache_hit(c: &mut Criterion) {
    let (executor, target) = executor(None);
    let find = target.target_type().method("find").expect("find");
    executor
        .execute(|| Ok(json!("dune")), &target, &find, vec![json!(1)])
        .expect("warm up");

    c.bench_function("cache_hit", |b| {
        b.iter(|| {
            executor
                .execute(|| Ok(json!("dune")), &target, &find, vec![black_box(json!(1))])
                .expect("hit")
        })
    });
}

fn benchmark_cache_miss(c: &mut Criterion) {
    let (executor, target) = executor(None);
    let find = target.target_type().method("find").expect("find");
    let mut id = 0i64;

    c.bench_function("cache_miss", |b| {
        b.iter(|| {
            id += 1;
            executor
                .execute(|| Ok(json!("dune")), &target, &find, vec![json!(id)])
                .expect("miss")
        })
    });
}

fn benchmark_key_expression(c: &mut Criterion) {
    let (executor, target) = executor(Some("'book:' + #id"));
    let find = target.target_type().method("find").expect("find");
    executor
        .execute(|| Ok(json!("dune")), &target, &find, vec![json!(1)])
        .expect("warm up");

    c.bench_function("cache_hit_key_expression", |b| {
        b.iter(|| {
            executor
                .execute(|| Ok(json!("dune")), &target, &find, vec![black_box(json!(1))])
                .expect("hit")
        })
    });
}

fn benchmark_key_generation(c: &mut Criterion) {
    let args = vec![json!("978-0441013593"), json!(2), json!(["scifi", "classic"])];
    c.bench_function("simple_key_generation", |b| {
        b.iter(|| SimpleKeyGenerator::generate_key(black_box(&args)))
    });
}

criterion_group!(
    benches,
    benchmark_cache_hit,
    benchmark_cache_miss,
    benchmark_key_expression,
    benchmark_key_generation
);
criterion_main!(benches);
