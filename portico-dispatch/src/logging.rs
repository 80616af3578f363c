//! Logging setup for the dispatch engine.
//!
//! Structured logging controlled by the `PORTICO_DEBUG` environment
//! variable.
//!
//! # Environment Variables
//!
//! - `PORTICO_DEBUG=true` - Enable debug logging
//! - `PORTICO_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `PORTICO_LOG_FORMAT=json|pretty|compact` - Set the output format
//!   (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use portico_dispatch::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Within the engine, the standard tracing macros are used:
//!
//! ```rust,ignore
//! debug!(host = %request.host, path = %request.path, "request dispatched");
//! warn!(error = %err, attempt, "transient failure, replaying request");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `PORTICO_DEBUG`.
///
/// Returns `true` if `PORTICO_DEBUG` is set to "true", "1", or "yes"
/// (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("PORTICO_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `PORTICO_LOG_LEVEL`.
///
/// Defaults to "debug" if `PORTICO_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    if let Ok(level) = env::var("PORTICO_LOG_LEVEL") {
        match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => {
                if is_debug_enabled() {
                    "debug"
                } else {
                    "warn"
                }
            }
        }
    } else if is_debug_enabled() {
        "debug"
    } else {
        "warn"
    }
}

/// Get the configured log format from `PORTICO_LOG_FORMAT`.
///
/// Defaults to "json" for structured logging.
pub fn get_log_format() -> &'static str {
    env::var("PORTICO_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize the logging system.
///
/// Call once at application startup; subsequent calls are no-ops. Without
/// the `logging` feature this only reads the environment and leaves
/// subscriber installation to the embedding application.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("PORTICO_LOG_LEVEL").is_err() {
            // No logging requested, skip initialization
            return;
        }

        #[cfg(feature = "logging")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "portico_store={},portico_router={},portico_dispatch={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(
                level = level,
                format = get_log_format(),
                "Portico logging initialized"
            );
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: This should only be called at program startup before threads
    // are spawned. The user is responsible for calling this safely.
    unsafe {
        env::set_var("PORTICO_LOG_LEVEL", level);
    }
    init();
}
