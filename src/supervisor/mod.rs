//! Tool server supervision for hexpilot.
//!
//! The supervisor owns the lifecycle of the external tool-execution server:
//! it detects an already-running instance, spawns one when absent, polls the
//! readiness endpoint until the server answers, and guarantees bounded
//! shutdown of anything it started. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
