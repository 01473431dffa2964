//! Tool transport port.

use crate::tool_registry::domain::{InvocationResult, ToolRegistry, ToolRegistryDomainError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Request/response client for a tool-serving peer.
///
/// Methods take `&mut self`: a transport never has more than one request in
/// flight.
#[async_trait]
pub trait ToolTransport: Send {
    /// Performs the handshake and discovers the tool catalog.
    ///
    /// Discovery runs once; later calls return the same registry.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the handshake or discovery fails.
    async fn initialize(&mut self) -> Result<Arc<ToolRegistry>, TransportError>;

    /// Invokes `name` with `arguments` and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Transport`] for link failures, including
    /// timeouts, and [`InvocationError::Tool`] when the peer rejects the call.
    async fn invoke(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<InvocationResult, InvocationError>;

    /// Closes the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Failures of the link to the peer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The peer process could not be started.
    #[error("failed to spawn MCP peer '{command}': {source}")]
    Spawn {
        /// Command that failed to start.
        command: String,
        /// Underlying I/O failure.
        source: Arc<std::io::Error>,
    },

    /// Reading from or writing to the peer failed.
    #[error("MCP transport I/O failure: {0}")]
    Io(Arc<std::io::Error>),

    /// The peer closed its output stream.
    #[error("MCP peer closed the connection")]
    Closed,

    /// No response arrived before the deadline.
    #[error("MCP request '{method}' timed out after {after:?}")]
    Timeout {
        /// Request method.
        method: String,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// A frame could not be decoded.
    #[error("malformed MCP frame: {0}")]
    MalformedFrame(String),

    /// A response carried a correlation id other than the pending request's.
    #[error("unexpected MCP response id {received} (expected {expected})")]
    UnexpectedResponse {
        /// Id of the pending request.
        expected: u64,
        /// Id found in the response.
        received: String,
    },

    /// A response was well-framed but its payload had the wrong shape.
    #[error("invalid MCP payload for '{method}': {reason}")]
    InvalidPayload {
        /// Request method.
        method: String,
        /// Decoding failure.
        reason: String,
    },

    /// The peer refused the initialize handshake.
    #[error("MCP handshake rejected: {0}")]
    Handshake(String),

    /// The discovered catalog violated registry rules.
    #[error("invalid tool catalog: {0}")]
    Catalog(#[from] ToolRegistryDomainError),

    /// An invocation was attempted before discovery.
    #[error("MCP session is not initialized")]
    NotInitialized,

    /// An earlier failure left the connection unusable.
    #[error("MCP connection is unusable after an earlier failure")]
    Unusable,
}

impl TransportError {
    /// Wraps an I/O failure.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Failures reported by the peer for a well-formed request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// The peer answered the call with a JSON-RPC error.
    #[error("tool '{tool}' failed: {message} (code {code})")]
    Remote {
        /// Tool that was invoked.
        tool: String,
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the peer.
        message: String,
    },

    /// The requested tool is not in the session registry.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

/// Failure of a single invocation.
#[derive(Debug, Clone, Error)]
pub enum InvocationError {
    /// The link failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer rejected the call.
    #[error(transparent)]
    Tool(#[from] ToolError),
}
