//! Executors wired from `CachingSettings`.

mod common;

use cache_aspect::config::{CachingSettings, ErrorHandlingMode};
use cache_aspect::interceptor::{CacheOperation, DeclaredOperations, Target};
use cache_aspect::CacheOperationExecutor;
use common::book_service;
use serde_json::{json, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::io::Write;

fn declared() -> DeclaredOperations {
    let ty = book_service();
    let declared = DeclaredOperations::new();
    declared
        .declare_method(
            &ty.method("find").unwrap(),
            [CacheOperation::cacheable().cache_name("books")],
        )
        .unwrap();
    declared
        .declare_method(
            &ty.method("all").unwrap(),
            [CacheOperation::cacheable().cache_name("catalog")],
        )
        .unwrap();
    declared
        .declare_method(
            &ty.method("internal").unwrap(),
            [CacheOperation::cacheable().cache_name("books")],
        )
        .unwrap();
    declared
}

/// Call `method` on a fresh `BookService` target `times` times, returning
/// how often the underlying method ran
fn invocations(executor: &CacheOperationExecutor, method: &str, args: Vec<Value>, times: usize) -> usize {
    let ty = book_service();
    let target = Target::of(ty.clone());
    let method = ty.method(method).unwrap();
    let calls = Cell::new(0);
    for _ in 0..times {
        executor
            .execute(
                || {
                    calls.set(calls.get() + 1);
                    Ok(json!("book"))
                },
                &target,
                &method,
                args.clone(),
            )
            .unwrap();
    }
    calls.get()
}

#[test]
fn test_default_settings_cache_results() {
    let executor = CacheOperationExecutor::from_settings(&CachingSettings::default(), declared()).unwrap();
    assert_eq!(invocations(&executor, "find", vec![json!(1)], 3), 1);
}

#[test]
fn test_noop_backend_always_invokes() {
    let settings = CachingSettings::load_with_environment(
        None,
        HashMap::from([(
            "CACHE_ASPECT__CACHE_MANAGER__BACKEND".to_string(),
            "noop".to_string(),
        )]),
    )
    .unwrap();
    let executor = CacheOperationExecutor::from_settings(&settings, declared()).unwrap();
    assert_eq!(invocations(&executor, "find", vec![json!(1)], 3), 3);
}

#[test]
fn test_disabled_manager_always_invokes() {
    let mut settings = CachingSettings::default();
    settings.cache_manager.enabled = false;
    let executor = CacheOperationExecutor::from_settings(&settings, declared()).unwrap();
    assert_eq!(invocations(&executor, "find", vec![json!(1)], 2), 2);
}

#[test]
fn test_static_cache_names_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[cache_manager]
dynamic = false
cache_names = ["books"]
"#
    )
    .unwrap();
    let settings = CachingSettings::load_with_environment(Some(file.path()), HashMap::new()).unwrap();
    let executor = CacheOperationExecutor::from_settings(&settings, declared()).unwrap();

    assert_eq!(invocations(&executor, "find", vec![json!(7)], 2), 1);

    let ty = book_service();
    let err = executor
        .execute(
            || Ok(json!([])),
            &Target::of(ty.clone()),
            &ty.method("all").unwrap(),
            vec![],
        )
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Cannot find cache named 'catalog'"));
}

#[test]
fn test_public_methods_only_toggle() {
    let executor = CacheOperationExecutor::from_settings(&CachingSettings::default(), declared()).unwrap();
    assert_eq!(invocations(&executor, "internal", vec![json!(1)], 2), 2);

    let settings = CachingSettings {
        public_methods_only: false,
        ..CachingSettings::default()
    };
    let executor = CacheOperationExecutor::from_settings(&settings, declared()).unwrap();
    assert_eq!(invocations(&executor, "internal", vec![json!(1)], 2), 1);
}

#[test]
fn test_log_mode_from_environment() {
    let settings = CachingSettings::load_with_environment(
        None,
        HashMap::from([("CACHE_ASPECT__ERROR_HANDLER".to_string(), "log".to_string())]),
    )
    .unwrap();
    assert_eq!(settings.error_handler, ErrorHandlingMode::Log);
    let executor = CacheOperationExecutor::from_settings(&settings, declared()).unwrap();
    assert_eq!(invocations(&executor, "find", vec![json!(2)], 2), 1);
}

#[cfg(feature = "cache-moka")]
#[test]
fn test_moka_backend() {
    let mut settings = CachingSettings::default();
    settings.cache_manager.backend = "moka".to_string();
    settings.cache_manager.moka.max_capacity = 16;
    let executor = CacheOperationExecutor::from_settings(&settings, declared()).unwrap();
    assert_eq!(invocations(&executor, "find", vec![json!(9)], 3), 1);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let mut settings = CachingSettings::default();
    settings.cache_manager.backend = " ".to_string();
    let err = CacheOperationExecutor::from_settings(&settings, declared()).unwrap_err();
    assert!(err.is_configuration());
}
