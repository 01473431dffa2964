//! Domain model for tool server supervision.
//!
//! The supervisor domain models launch settings, readiness polling policy,
//! and the monotonic lifecycle of the supervised server. Process and network
//! concerns remain outside this boundary.

mod config;
mod error;
mod lifecycle;

pub use config::{Backoff, DEFAULT_READINESS_PATH, ServerLaunchSpec, SupervisorConfig};
pub use error::SupervisorDomainError;
pub use lifecycle::{ServerLifecycle, ServerOwnership, ServerStatus};
