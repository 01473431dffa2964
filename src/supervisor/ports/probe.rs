//! Readiness probe port for the supervised server.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for readiness probes.
pub type HealthProbeResult<T> = Result<T, HealthProbeError>;

/// Checks whether the server behind a URL answers as ready.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probes `url`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthProbeError`] when the server is unreachable, slow, or
    /// answers with a non-success status.
    async fn probe(&self, url: &str, timeout: Duration) -> HealthProbeResult<()>;
}

/// Reasons a readiness probe did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HealthProbeError {
    /// The connection could not be established.
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The server answered with a non-success status code.
    #[error("server answered with status {0}")]
    UnexpectedStatus(u16),

    /// The probe did not complete within its timeout.
    #[error("readiness probe timed out")]
    Timeout,
}
