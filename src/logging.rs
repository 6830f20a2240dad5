//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//!
//! The engine itself only emits `tracing` events (cache hits and misses,
//! computed keys, skipped conditions, handled backend errors). Applications
//! that already install a subscriber need nothing from this module;
//! [`init_tracing`] is a convenience for binaries, benchmarks and tests.
//!
//! ## Environment variables
//!
//! - `CACHE_ASPECT_ENV` (falling back to `APP_ENV`): `development`, `test`
//!   or `production`; selects the default level
//! - `LOG_LEVEL`, then `RUST_LOG`: explicit filter directives
//! - `LOG_FORMAT=json`: emit JSON lines instead of human-readable output

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging once per process.
///
/// Safe to call repeatedly and safe to call when another global subscriber
/// is already installed; later calls are no-ops.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        // Determine if we're in a TTY for ANSI color support
        let use_ansi = !json && IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer.with_filter(EnvFilter::new(&log_level)));

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                json,
                ansi_colors = use_ansi,
                "Console logging initialized"
            );
        }
    });
}

/// Deployment environment name, `development` when unset
pub fn get_environment() -> String {
    std::env::var("CACHE_ASPECT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Filter directives for `environment`, honoring explicit overrides
pub fn get_log_level(environment: &str) -> String {
    resolve_log_level(
        environment,
        std::env::var("LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
    )
}

fn resolve_log_level(
    environment: &str,
    log_level: Option<String>,
    rust_log: Option<String>,
) -> String {
    // First check for explicit LOG_LEVEL, then RUST_LOG
    if let Some(level) = log_level.or(rust_log) {
        return level.to_lowercase();
    }

    // Fall back to environment-based defaults
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
