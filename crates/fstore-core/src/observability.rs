//! Logging initialization and span helpers.
//!
//! Orchestrator and chunk workers log through `tracing` with consistent
//! spans so that a materialization can be followed across processes.

use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "" => Ok(Self::Pretty),
            other => Err(Error::configuration(format!("unknown log format '{other}'"))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Safe to call multiple times; only the first call installs a subscriber.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `fstore_runner=debug`)
///
/// # Example
///
/// ```rust
/// use fstore_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
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

/// Creates a span for orchestrator operations on one resource.
///
/// # Example
///
/// ```rust
/// use fstore_core::observability::materialize_span;
///
/// let span = materialize_span("run", "avg_txn", "v1");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn materialize_span(operation: &str, name: &str, variant: &str) -> Span {
    tracing::info_span!("materialize", op = operation, name = name, variant = variant)
}

/// Creates a span for a single chunk copy.
#[must_use]
pub fn chunk_span(name: &str, variant: &str, chunk_index: u64) -> Span {
    tracing::info_span!("chunk", name = name, variant = variant, chunk = chunk_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn spans_can_be_entered() {
        let span = materialize_span("run", "avg_txn", "v1");
        let _guard = span.enter();
        let chunk = chunk_span("avg_txn", "v1", 3);
        let _inner = chunk.enter();
        tracing::info!(count = 9, "copying rows");
    }

    #[test]
    fn log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
