//! Language model port.

use crate::conversation::domain::{Conversation, ModelTurn};
use crate::tool_registry::domain::ToolRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for model adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Produces the next model turn for a conversation.
///
/// Adapters hold no conversation state; the system prompt is fixed at
/// construction and the tool catalog is supplied on every call.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Runs one inference over the full history.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the provider cannot be reached, rejects
    /// the request, or answers with an undecodable body.
    async fn infer(
        &self,
        conversation: &Conversation,
        registry: &ToolRegistry,
    ) -> AdapterResult<ModelTurn>;

    /// Returns the provider name for display.
    fn provider(&self) -> &str;

    /// Returns the model identifier for display.
    fn model(&self) -> &str;
}

/// Errors raised by model adapters.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The HTTP exchange failed before a response arrived.
    #[error("model request failed: {0}")]
    Http(Arc<dyn std::error::Error + Send + Sync>),

    /// The provider answered with a non-success status.
    #[error("model provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The provider answered with a body that could not be decoded.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl AdapterError {
    /// Wraps a transport-level failure.
    #[must_use]
    pub fn http(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Http(Arc::new(err))
    }
}
