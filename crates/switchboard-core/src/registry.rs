//! Tool registry: which server owns each tool name.

use std::collections::HashMap;
use switchboard_mcp::{ServerCatalog, ToolDescriptor};
use switchboard_types::ToolDefinition;

/// Maps tool names to the index of the server that serves them.
///
/// When two servers advertise the same name, the one registered later wins.
/// The descriptor list keeps one entry per name, in the order names were first
/// seen, holding the winner's descriptor.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    owners: HashMap<String, usize>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every catalog in index order.
    pub fn from_catalogs(catalogs: &[ServerCatalog]) -> Self {
        let mut ordered: Vec<&ServerCatalog> = catalogs.iter().collect();
        ordered.sort_by_key(|c| c.index);

        let mut registry = Self::new();
        for catalog in ordered {
            for tool in &catalog.tools {
                registry.register(catalog.index, tool.clone());
            }
        }
        registry
    }

    /// Record that `server_index` serves `descriptor`, replacing any earlier owner.
    pub fn register(&mut self, server_index: usize, descriptor: ToolDescriptor) {
        match self.owners.insert(descriptor.name.clone(), server_index) {
            Some(previous) => {
                tracing::warn!(
                    "Tool '{}' from server {} overrides the one from server {}",
                    descriptor.name,
                    server_index + 1,
                    previous + 1
                );
                if let Some(slot) = self
                    .descriptors
                    .iter_mut()
                    .find(|d| d.name == descriptor.name)
                {
                    *slot = descriptor;
                }
            }
            None => self.descriptors.push(descriptor),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.owners.get(name).copied()
    }

    /// The tool catalog sent with the first model call of a query.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors
            .iter()
            .map(|d| ToolDefinition {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema.clone(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
