//! Error types for supervisor domain validation.

use thiserror::Error;

/// Errors returned while constructing or transitioning supervisor values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorDomainError {
    /// The server launch command is empty after trimming.
    #[error("server launch command must not be empty")]
    EmptyLaunchCommand,

    /// The server base address is empty after trimming.
    #[error("server base address must not be empty")]
    EmptyBaseAddress,

    /// The server base address does not have an `http://` or `https://` prefix.
    #[error("server base address '{0}' must start with 'http://' or 'https://'")]
    InvalidBaseAddress(String),

    /// Transitioning between two server states is invalid.
    #[error("invalid server status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: String,
        /// Requested target status.
        to: String,
    },
}
