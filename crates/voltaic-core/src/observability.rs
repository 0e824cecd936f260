//! Observability infrastructure for Voltaic.
//!
//! Structured logging with one span per archive run. The pipeline emits
//! a log line per milestone (window computed, rows extracted, partition
//! written, rows deleted/inserted, swap completed); this module owns
//! subscriber initialization and the span constructor.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for scheduled runs).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at process startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g. `info`, `voltaic_archive=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates the span enclosing one archive run.
#[must_use]
pub fn archive_span(target_date: &str, measurement: &str) -> Span {
    tracing::info_span!(
        "archive_run",
        target_date = target_date,
        measurement = measurement,
    )
}
