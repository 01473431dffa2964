//! Outcome of a single tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload returned by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum InvocationContent {
    /// Plain text output.
    Text(String),
    /// Structured JSON output.
    Structured(Value),
}

impl InvocationContent {
    /// Renders the payload as text for the conversation.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Result of one tool invocation.
///
/// `is_error` reports a failure the tool itself described; transport
/// failures never produce an `InvocationResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    content: InvocationContent,
    is_error: bool,
}

impl InvocationResult {
    /// Creates a successful result.
    #[must_use]
    pub const fn success(content: InvocationContent) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Creates a result for a tool-reported failure.
    #[must_use]
    pub const fn tool_failure(content: InvocationContent) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    /// Creates a successful plain-text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(InvocationContent::Text(text.into()))
    }

    /// Returns the payload.
    #[must_use]
    pub const fn content(&self) -> &InvocationContent {
        &self.content
    }

    /// Returns whether the tool reported a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Splits the result into its payload and error flag.
    #[must_use]
    pub fn into_parts(self) -> (InvocationContent, bool) {
        (self.content, self.is_error)
    }
}
