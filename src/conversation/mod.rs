//! Conversation between the operator, a language model, and the tools.
//!
//! This module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Provider adapters in [`adapters`]
//! - The turn-taking loop in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
