//! Tool call correlation identifiers.

use super::ConversationDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlates a tool call request with its result.
///
/// Providers that assign their own ids keep them verbatim; otherwise the
/// loop generates one.
///
/// # Examples
///
/// ```
/// use hexpilot::conversation::domain::ToolCallId;
///
/// let id = ToolCallId::generate();
/// assert!(id.as_str().starts_with("call_"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallId(String);

impl ToolCallId {
    /// Wraps a provider-assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::EmptyToolCallId`] when the value is
    /// empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, ConversationDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ConversationDomainError::EmptyToolCallId);
        }
        Ok(Self(normalized))
    }

    /// Generates a fresh `call_<uuid>` identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("call_{}", Uuid::new_v4().simple()))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ToolCallId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
