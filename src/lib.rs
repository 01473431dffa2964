//! Hexpilot: an operator console that lets a language model drive hexstrike
//! security tools.
//!
//! The crate supervises the hexstrike tool server, speaks MCP to its tool
//! bridge over stdio, and runs a conversation loop in which the model may
//! request tool calls that are executed and fed back before it answers.
//!
//! # Architecture
//!
//! Hexpilot follows hexagonal architecture principles:
//!
//! - **Domain**: Pure value types and invariants with no infrastructure
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (processes, HTTP, stdio)
//!
//! # Modules
//!
//! - [`supervisor`]: Tool server detection, startup, and shutdown
//! - [`tool_registry`]: MCP handshake, tool discovery, and invocation
//! - [`conversation`]: History, model adapters, and the turn loop
//! - [`session`]: Configuration, console, and wiring

pub mod conversation;
pub mod session;
pub mod supervisor;
pub mod tool_registry;
