//! Structured JSON logging setup using tracing.
//!
//! Output is one JSON object per event, suitable for log aggregation.
//! `RUST_LOG` takes precedence over the configured filter.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with JSON logging.
///
/// # Arguments
///
/// * `filter` - The log filter directive (e.g., "info,fedgate_saml=debug")
///
/// # Errors
///
/// Returns the parse error when `RUST_LOG` is unset and `filter` is invalid.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_logging(filter: &str) -> Result<(), ParseError> {
    let filter_layer = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(filter)?,
    };

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    tracing::info!(filter = %filter, "Logging initialized");
    Ok(())
}

/// Initialize logging for tests (with simpler output).
///
/// Safe to call repeatedly; only the first call installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .try_init();
}
