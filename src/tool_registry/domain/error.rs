//! Error types for tool registry domain validation.

use thiserror::Error;

/// Errors returned while constructing tool registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolRegistryDomainError {
    /// A tool descriptor name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// Two discovered tools share a name.
    #[error("duplicate tool name in catalog: {0}")]
    DuplicateToolName(String),

    /// The MCP peer program is blank.
    #[error("MCP peer command must not be empty")]
    EmptyPeerCommand,
}
