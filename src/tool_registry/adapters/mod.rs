//! Adapter implementations for the tool transport port.

pub mod memory;

mod framed;
mod protocol;
mod stdio;

pub use protocol::PROTOCOL_VERSION;
pub use stdio::{McpToolTransport, StdioMcpTransport};
