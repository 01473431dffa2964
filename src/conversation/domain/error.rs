//! Error types for conversation domain rules.

use thiserror::Error;

/// Violations of the conversation history rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationDomainError {
    /// A tool call identifier was empty.
    #[error("tool call id must not be empty")]
    EmptyToolCallId,

    /// A tool call request reused an identifier already in the history.
    #[error("tool call id '{0}' is already recorded")]
    DuplicateToolCallId(String),

    /// A tool result did not match any open tool call request.
    #[error("tool result '{0}' has no open tool call request")]
    OrphanToolResult(String),

    /// A tool call named no tool.
    #[error("tool call '{0}' has an empty tool name")]
    EmptyToolName(String),
}
