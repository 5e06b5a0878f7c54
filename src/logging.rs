//! Logging initialization and configuration.
//!
//! Logs go to stderr so that the prompt and evaluation results on stdout
//! stay clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config sets a level.
pub const DEFAULT_FILTER: &str = "shell_rewrite=warn";

fn filter_for(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) if !level.trim().is_empty() => {
            let directive = if level.contains('=') {
                level.to_string()
            } else {
                format!("shell_rewrite={}", level.trim())
            };
            EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Initialize the logging system.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `shell_rewrite=warn`.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init() {
    init_with_level(None);
}

/// Initialize the logging system with an explicit level.
///
/// A bare level such as `debug` applies to this crate only; a full
/// directive such as `shell_rewrite=trace,tokio=debug` is used verbatim.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been set.
pub fn init_with_level(level: Option<&str>) {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init(level: Option<&str>) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}
