//! Units of conversation content.

use super::ToolCallId;
use crate::tool_registry::domain::InvocationContent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker a turn is attributed to when sent to a model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnRole {
    /// The human operator, including tool results relayed on their behalf.
    User,
    /// The model.
    Assistant,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationTurn {
    /// Text typed by the operator.
    UserMessage {
        /// Message text.
        text: String,
    },
    /// Text produced by the model.
    AssistantMessage {
        /// Message text.
        text: String,
    },
    /// A tool invocation requested by the model.
    ToolCallRequest {
        /// Correlation id.
        id: ToolCallId,
        /// Requested tool.
        tool_name: String,
        /// JSON arguments.
        arguments: Value,
    },
    /// Outcome of a requested tool invocation.
    ToolResult {
        /// Correlation id of the request.
        id: ToolCallId,
        /// Tool output or diagnostic.
        content: InvocationContent,
        /// Whether the invocation failed.
        is_error: bool,
    },
}

impl ConversationTurn {
    /// Returns the provider-facing role of the turn.
    #[must_use]
    pub const fn role(&self) -> TurnRole {
        match self {
            Self::UserMessage { .. } | Self::ToolResult { .. } => TurnRole::User,
            Self::AssistantMessage { .. } | Self::ToolCallRequest { .. } => TurnRole::Assistant,
        }
    }
}
