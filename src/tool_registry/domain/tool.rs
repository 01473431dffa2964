//! Tool descriptor value object.

use super::ToolRegistryDomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Metadata for a tool exposed by the MCP peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    argument_schema: Value,
}

impl ToolDescriptor {
    /// Creates a tool descriptor.
    ///
    /// Descriptions may be empty; peers often omit them.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::EmptyToolName`] when the name is
    /// empty after trimming.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        argument_schema: Value,
    ) -> Result<Self, ToolRegistryDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(ToolRegistryDomainError::EmptyToolName);
        }

        Ok(Self {
            name: normalized_name,
            description: description.into().trim().to_owned(),
            argument_schema,
        })
    }

    /// Returns the schema used when a peer omits one.
    #[must_use]
    pub fn default_schema() -> Value {
        json!({"type": "object", "properties": {}})
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON schema of the tool arguments.
    #[must_use]
    pub const fn argument_schema(&self) -> &Value {
        &self.argument_schema
    }
}
