//! The mirrored tool registry.
//!
//! Built once per upstream session and immutable afterwards, so it is shared
//! behind an `Arc` without locking.

use std::collections::BTreeMap;

use super::schema::InputSchema;
use crate::mcp::Tool;

/// Name, title, description and schema of one mirrored tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    /// Wire form for `tools/list`.
    pub fn to_wire(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.raw().clone(),
        }
    }
}

/// How a mirrored tool behaves when called.
#[derive(Debug, Clone)]
pub enum MirroredTool {
    /// Uploads the caller's local `filepath` into the sandbox before forwarding.
    SandboxOpen(ToolDescriptor),
    /// Rewrites known paths, then forwards.
    Passthrough(ToolDescriptor),
}

impl MirroredTool {
    pub fn descriptor(&self) -> &ToolDescriptor {
        match self {
            MirroredTool::SandboxOpen(d) | MirroredTool::Passthrough(d) => d,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor().name
    }

    pub fn uploads_local_file(&self) -> bool {
        matches!(self, MirroredTool::SandboxOpen(_))
    }
}

/// Immutable snapshot of the mirrored catalog, keyed and ordered by name.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, MirroredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Add a tool. Returns false, keeping the first, if the name is taken.
    pub fn insert(&mut self, tool: MirroredTool) -> bool {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return false;
        }
        self.tools.insert(name, tool);
        true
    }

    pub fn get(&self, name: &str) -> Option<&MirroredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Wire descriptors for `tools/list`, sorted by name.
    pub fn list(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.descriptor().to_wire()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            title: Some(format!("{} title", name)),
            description: None,
            input_schema: InputSchema::translate(name, &json!({"type": "object"})).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut registry = ToolRegistry::new();
        assert!(registry.insert(MirroredTool::Passthrough(descriptor("decompile"))));
        assert!(registry.contains("decompile"));
        assert!(!registry.get("decompile").unwrap().uploads_local_file());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let mut registry = ToolRegistry::new();
        assert!(registry.insert(MirroredTool::SandboxOpen(descriptor("open"))));
        assert!(!registry.insert(MirroredTool::Passthrough(descriptor("open"))));
        assert!(registry.get("open").unwrap().uploads_local_file());
    }

    #[test]
    fn test_list_is_sorted_wire_form() {
        let mut registry = ToolRegistry::new();
        registry.insert(MirroredTool::Passthrough(descriptor("zeta")));
        registry.insert(MirroredTool::Passthrough(descriptor("alpha")));
        let tools = registry.list();
        assert_eq!(tools[0].name, "alpha");
        assert_eq!(tools[1].title.as_deref(), Some("zeta title"));
        assert_eq!(tools[0].input_schema["type"], "object");
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
