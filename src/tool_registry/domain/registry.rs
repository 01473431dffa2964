//! Immutable per-session tool catalog.

use super::{ToolDescriptor, ToolRegistryDomainError};
use std::collections::HashMap;

/// The set of tools discovered for a session.
///
/// Built once from discovery and never modified afterwards; sessions share it
/// behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Builds a registry preserving discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::DuplicateToolName`] when two
    /// descriptors share a name.
    pub fn new(
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<Self, ToolRegistryDomainError> {
        let mut registry = Self::default();
        for tool in tools {
            if registry.index.contains_key(tool.name()) {
                return Err(ToolRegistryDomainError::DuplicateToolName(
                    tool.name().to_owned(),
                ));
            }
            registry
                .index
                .insert(tool.name().to_owned(), registry.tools.len());
            registry.tools.push(tool);
        }
        Ok(registry)
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).and_then(|&slot| self.tools.get(slot))
    }

    /// Returns whether a tool with `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns every tool in discovery order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry has no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, format!("Runs {name}"), json!({"type": "object"}))
            .expect("valid tool")
    }

    #[test]
    fn lookup_preserves_discovery_order() {
        let registry = ToolRegistry::new([tool("nmap_scan"), tool("gobuster_scan")])
            .expect("unique names");

        let names: Vec<_> = registry.tools().iter().map(ToolDescriptor::name).collect();
        assert_eq!(names, ["nmap_scan", "gobuster_scan"]);
        assert!(registry.contains("gobuster_scan"));
        assert_eq!(
            registry.get("nmap_scan").map(ToolDescriptor::description),
            Some("Runs nmap_scan")
        );
        assert!(registry.get("sqlmap_scan").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = ToolRegistry::new([tool("nmap_scan"), tool("nmap_scan")]);

        assert_eq!(
            result,
            Err(ToolRegistryDomainError::DuplicateToolName(
                "nmap_scan".to_owned()
            ))
        );
    }

    #[test]
    fn blank_tool_name_is_rejected() {
        assert_eq!(
            ToolDescriptor::new("  ", "", ToolDescriptor::default_schema()),
            Err(ToolRegistryDomainError::EmptyToolName)
        );
    }
}
