//! Append-only conversation history.

use super::{ConversationDomainError, ConversationTurn, ToolCallId};
use crate::tool_registry::domain::InvocationResult;
use serde_json::Value;
use std::collections::HashSet;

/// Ordered, append-only sequence of turns.
///
/// The history offers no removal. Every tool call request stays open until
/// exactly one result is recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    known_call_ids: HashSet<ToolCallId>,
    open_calls: Vec<ToolCallId>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends operator text.
    pub fn record_user_message(&mut self, text: impl Into<String>) {
        self.turns
            .push(ConversationTurn::UserMessage { text: text.into() });
    }

    /// Appends model text.
    pub fn record_assistant_message(&mut self, text: impl Into<String>) {
        self.turns
            .push(ConversationTurn::AssistantMessage { text: text.into() });
    }

    /// Appends a tool call request and opens it.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::DuplicateToolCallId`] when `id` was
    /// used before, or [`ConversationDomainError::EmptyToolName`] when no tool
    /// is named.
    pub fn record_tool_call(
        &mut self,
        id: ToolCallId,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Result<(), ConversationDomainError> {
        let tool = tool_name.into();
        if tool.trim().is_empty() {
            return Err(ConversationDomainError::EmptyToolName(id.to_string()));
        }
        if !self.known_call_ids.insert(id.clone()) {
            return Err(ConversationDomainError::DuplicateToolCallId(id.to_string()));
        }

        self.open_calls.push(id.clone());
        self.turns.push(ConversationTurn::ToolCallRequest {
            id,
            tool_name: tool,
            arguments,
        });
        Ok(())
    }

    /// Appends the result for an open tool call and closes it.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::OrphanToolResult`] when no open
    /// request carries `id`.
    pub fn record_tool_result(
        &mut self,
        id: &ToolCallId,
        result: InvocationResult,
    ) -> Result<(), ConversationDomainError> {
        let Some(position) = self.open_calls.iter().position(|open| open == id) else {
            return Err(ConversationDomainError::OrphanToolResult(id.to_string()));
        };

        self.open_calls.remove(position);
        let (content, is_error) = result.into_parts();
        self.turns.push(ConversationTurn::ToolResult {
            id: id.clone(),
            content,
            is_error,
        });
        Ok(())
    }

    /// Returns whether `id` was used by any request so far.
    #[must_use]
    pub fn is_known_call_id(&self, id: &ToolCallId) -> bool {
        self.known_call_ids.contains(id)
    }

    /// Returns requests still awaiting a result, in request order.
    #[must_use]
    pub fn open_tool_calls(&self) -> &[ToolCallId] {
        &self.open_calls
    }

    /// Returns the tool named by the request with `id`.
    #[must_use]
    pub fn tool_name_for(&self, id: &ToolCallId) -> Option<&str> {
        self.turns.iter().find_map(|turn| match turn {
            ConversationTurn::ToolCallRequest {
                id: request_id,
                tool_name,
                ..
            } if request_id == id => Some(tool_name.as_str()),
            _ => None,
        })
    }

    /// Returns the turns in order.
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns whether no turn was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
