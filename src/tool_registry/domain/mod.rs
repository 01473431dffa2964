//! Domain model for MCP tool discovery and invocation.
//!
//! The tool registry domain models discovered tool metadata, the immutable
//! per-session catalog, invocation outcomes, and the MCP peer launch settings.
//! Wire-format concerns remain outside this boundary.

mod error;
mod invocation;
mod registry;
mod tool;
mod transport;

pub use error::ToolRegistryDomainError;
pub use invocation::{InvocationContent, InvocationResult};
pub use registry::ToolRegistry;
pub use tool::ToolDescriptor;
pub use transport::{McpPeerSpec, TransportTimeouts};
