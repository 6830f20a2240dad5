//! Synchronized (`sync = true`) reads: single-flight and validation.

mod common;

use cache_aspect::interceptor::{CacheOperation, InvocationError};
use cache_aspect::CacheAspectError;
use common::{BookNotFound, HarnessBuilder};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const CALLERS: usize = 8;

fn concurrent_calls(harness: &common::Harness, method: &'static str) -> Vec<serde_json::Value> {
    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let harness = harness.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                harness
                    .call_with(method, vec![json!(42)], || {
                        thread::sleep(Duration::from_millis(100));
                        Ok(json!(Uuid::new_v4().to_string()))
                    })
                    .expect("synchronized call")
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().expect("caller thread"))
        .collect()
}

#[test]
fn test_concurrent_callers_share_one_invocation() {
    let harness = HarnessBuilder::new()
        .declare("find", [CacheOperation::cacheable().cache_name("books").sync(true)])
        .build();

    let tokens = concurrent_calls(&harness, "find");

    assert_eq!(harness.calls(), 1);
    assert!(tokens.iter().all(|token| *token == tokens[0]));
    assert_eq!(harness.cached("books", json!(42)), Some(tokens[0].clone()));
}

#[cfg(feature = "cache-moka")]
#[test]
fn test_moka_backend_is_single_flight() {
    use cache_aspect::cache::MokaCacheManager;
    use cache_aspect::config::MokaSettings;

    let harness = HarnessBuilder::new()
        .declare("find", [CacheOperation::cacheable().cache_name("books").sync(true)])
        .cache_manager(Arc::new(MokaCacheManager::new(MokaSettings::default(), true)))
        .build();

    let tokens = concurrent_calls(&harness, "find");

    assert_eq!(harness.calls(), 1);
    assert!(tokens.iter().all(|token| *token == tokens[0]));
}

#[test]
fn test_failed_condition_invokes_directly() {
    let harness = HarnessBuilder::new()
        .declare(
            "find",
            [CacheOperation::cacheable()
                .cache_name("books")
                .sync(true)
                .condition("#id > 100")],
        )
        .build();

    harness.call("find", vec![json!(1)], json!("a")).unwrap();
    harness.call("find", vec![json!(1)], json!("b")).unwrap();
    assert_eq!(harness.calls(), 2);
    assert!(harness.cache("books").is_empty());
}

#[test]
fn test_invocation_failure_is_unwrapped_and_not_cached() {
    let harness = HarnessBuilder::new()
        .declare("find", [CacheOperation::cacheable().cache_name("books").sync(true)])
        .build();

    let err = harness
        .call_with("find", vec![json!(3)], || Err(InvocationError::new(BookNotFound(3))))
        .unwrap_err();
    let CacheAspectError::Invocation(cause) = err else {
        panic!("expected the original invocation error");
    };
    assert_eq!(cause.downcast_ref::<BookNotFound>().unwrap().0, 3);
    assert!(harness.cache("books").is_empty());

    assert_eq!(harness.call("find", vec![json!(3)], json!("found")).unwrap(), json!("found"));
    assert_eq!(harness.calls(), 2);
}

/// Staggered callers whose loads all fail. Returns the peak number of loads
/// running at once.
fn staggered_failing_calls(harness: &common::Harness) -> usize {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let harness = harness.clone();
            let active = active.clone();
            let peak = peak.clone();
            thread::sleep(Duration::from_millis(15));
            thread::spawn(move || {
                harness.call_with("find", vec![json!(7)], move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Err(InvocationError::new(BookNotFound(7)))
                })
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().expect("caller thread").unwrap_err();
        assert!(matches!(err, CacheAspectError::Invocation(_)));
    }
    peak.load(Ordering::SeqCst)
}

#[test]
fn test_failed_loads_with_waiting_callers_stay_single_flight() {
    let harness = HarnessBuilder::new()
        .declare("find", [CacheOperation::cacheable().cache_name("books").sync(true)])
        .build();

    assert_eq!(staggered_failing_calls(&harness), 1);
    assert!(harness.calls() >= 1);
    assert!(harness.cache("books").is_empty());

    assert_eq!(harness.call("find", vec![json!(7)], json!("found")).unwrap(), json!("found"));
    assert_eq!(harness.cached("books", json!(7)), Some(json!("found")));
}

#[cfg(feature = "cache-moka")]
#[test]
fn test_moka_failed_loads_with_waiting_callers_stay_single_flight() {
    use cache_aspect::cache::MokaCacheManager;
    use cache_aspect::config::MokaSettings;

    let harness = HarnessBuilder::new()
        .declare("find", [CacheOperation::cacheable().cache_name("books").sync(true)])
        .cache_manager(Arc::new(MokaCacheManager::new(MokaSettings::default(), true)))
        .build();

    assert_eq!(staggered_failing_calls(&harness), 1);
    assert_eq!(harness.call("find", vec![json!(7)], json!("found")).unwrap(), json!("found"));
    assert_eq!(harness.call("find", vec![json!(7)], json!("other")).unwrap(), json!("found"));
}

#[test]
fn test_sync_cannot_be_combined_with_other_operations() {
    let harness = HarnessBuilder::new()
        .declare(
            "find",
            [
                CacheOperation::cacheable().cache_name("books").sync(true),
                CacheOperation::evict().cache_name("other"),
            ],
        )
        .build();
    let err = harness.call("find", vec![json!(1)], json!("x")).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("cannot be combined"));
    assert_eq!(harness.calls(), 0);
}

#[test]
fn test_only_one_sync_cacheable_allowed() {
    let harness = HarnessBuilder::new()
        .declare(
            "find",
            [
                CacheOperation::cacheable().cache_name("a").sync(true),
                CacheOperation::cacheable().cache_name("b"),
            ],
        )
        .build();
    let err = harness.call("find", vec![json!(1)], json!("x")).unwrap_err();
    assert!(err.to_string().contains("Only one sync=true operation"));
}

#[test]
fn test_sync_requires_a_single_cache() {
    let harness = HarnessBuilder::new()
        .declare(
            "find",
            [CacheOperation::cacheable().cache_names(["a", "b"]).sync(true)],
        )
        .build();
    let err = harness.call("find", vec![json!(1)], json!("x")).unwrap_err();
    assert!(err.to_string().contains("only allows a single cache"));
}

#[test]
fn test_sync_does_not_support_unless() {
    let harness = HarnessBuilder::new()
        .declare(
            "find",
            [CacheOperation::cacheable()
                .cache_name("a")
                .sync(true)
                .unless("#result == null")],
        )
        .build();
    let err = harness.call("find", vec![json!(1)], json!("x")).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("does not support the unless attribute"));
}
