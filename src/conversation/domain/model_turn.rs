//! Decoded model responses.

use super::ToolCallId;
use serde_json::Value;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedToolCall {
    /// Provider-assigned id, when the provider supplies one.
    pub id: Option<ToolCallId>,
    /// Requested tool.
    pub tool_name: String,
    /// JSON arguments.
    pub arguments: Value,
}

impl RequestedToolCall {
    /// Creates a request without a provider id.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Attaches a provider-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: ToolCallId) -> Self {
        self.id = Some(id);
        self
    }
}

/// What the model produced for one inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelTurn {
    /// Text only; the turn is complete.
    FinalText(String),
    /// One or more tool calls, optionally preceded by commentary.
    ToolCalls {
        /// Text emitted alongside the calls.
        commentary: Option<String>,
        /// Calls in the order they must be dispatched.
        calls: Vec<RequestedToolCall>,
    },
}

impl ModelTurn {
    /// Builds a turn from decoded text fragments and calls.
    ///
    /// Fragments are joined with newlines. Without calls the turn is final.
    #[must_use]
    pub fn from_parts(texts: Vec<String>, calls: Vec<RequestedToolCall>) -> Self {
        let text = texts.join("\n");
        if calls.is_empty() {
            return Self::FinalText(text);
        }

        let commentary = Some(text).filter(|joined| !joined.trim().is_empty());
        Self::ToolCalls { commentary, calls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_without_calls_are_final() {
        let turn = ModelTurn::from_parts(vec!["Ports 22".to_owned(), "and 80".to_owned()], vec![]);
        assert_eq!(turn, ModelTurn::FinalText("Ports 22\nand 80".to_owned()));
    }

    #[test]
    fn blank_commentary_is_dropped() {
        let call = RequestedToolCall::new("nmap_scan", json!({}));

        let turn = ModelTurn::from_parts(vec![" ".to_owned()], vec![call.clone()]);

        assert_eq!(
            turn,
            ModelTurn::ToolCalls {
                commentary: None,
                calls: vec![call]
            }
        );
    }
}
