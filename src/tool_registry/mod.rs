//! MCP tool discovery and invocation for hexpilot.
//!
//! The tool registry talks to an MCP peer over a framed, bidirectional byte
//! stream (the stdio of a child process). It performs the initialize
//! handshake, discovers the tool catalog once per session, and invokes tools
//! one request at a time. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;
