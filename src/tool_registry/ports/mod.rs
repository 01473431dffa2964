//! Port contracts for MCP tool discovery and invocation.

mod transport;

pub use transport::{InvocationError, ToolError, ToolTransport, TransportError};
