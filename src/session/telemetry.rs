//! Tracing subscriber installation.

use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Failure to install the global subscriber.
#[derive(Debug, Clone, Error)]
#[error("failed to initialise logging: {0}")]
pub struct TelemetryError(Arc<dyn std::error::Error + Send + Sync>);

/// Returns the filter directive used when `RUST_LOG` is unset.
#[must_use]
pub const fn default_directive(verbose: bool) -> &'static str {
    if verbose { "hexpilot=debug,info" } else { "info" }
}

/// Installs a formatted subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbose`. Logs go to stderr so they
/// never interleave with the operator transcript on stdout.
///
/// # Errors
///
/// Returns [`TelemetryError`] when a global subscriber is already set.
pub fn init_telemetry(verbose: bool) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| TelemetryError(Arc::from(err)))
}
