//! Structured logging setup.
//!
//! Log level can be configured via the `RUST_LOG` environment variable. When it
//! is unset the level from [`LoggingConfig`] applies.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

fn filter_or(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the logging system with human readable output at `info`.
///
/// # Example
/// ```no_run
/// use turnaround_core::logging;
///
/// logging::init();
/// tracing::info!("Desk started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for log aggregation.
///
/// # Example
/// ```no_run
/// use turnaround_core::logging;
///
/// logging::init_json();
/// tracing::info!(turnaround_id = "AF1234-2026-10-16", "Turnaround opened");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize human readable output on stderr, leaving stdout to command output.
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// Initialize from configuration. Returns `false` if a global subscriber was
/// already installed.
pub fn init_with(config: &LoggingConfig) -> bool {
    let filter = filter_or(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
            .is_ok()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .is_ok()
    }
}
