//! Catalog mirroring: backend `tools/list` → local [`ToolRegistry`].

use super::registry::{MirroredTool, ToolDescriptor, ToolRegistry};
use super::schema::InputSchema;
use crate::mcp::Tool;
use crate::types::{Result, UpstreamConfig};
use crate::upstream::Upstream;

/// Decides which backend tools are exposed and how each one behaves.
#[derive(Debug, Clone)]
pub struct CatalogMirror {
    reserved_prefixes: Vec<String>,
    sandbox_open_tool: String,
}

impl CatalogMirror {
    pub fn new(reserved_prefixes: Vec<String>, sandbox_open_tool: impl Into<String>) -> Self {
        Self {
            reserved_prefixes,
            sandbox_open_tool: sandbox_open_tool.into(),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            config.reserved_prefixes.clone(),
            config.sandbox_open_tool.clone(),
        )
    }

    /// Backend-internal tools are never exposed.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Fetch the backend catalog once and mirror it.
    pub async fn mirror(&self, upstream: &dyn Upstream) -> Result<ToolRegistry> {
        let tools = upstream.list_tools().await?;
        Ok(self.build_registry(tools))
    }

    /// Mirror an already fetched catalog. A tool whose schema cannot be
    /// translated is logged and skipped; the rest are still registered.
    pub fn build_registry(&self, tools: Vec<Tool>) -> ToolRegistry {
        let total = tools.len();
        let mut registry = ToolRegistry::new();
        let mut reserved = 0usize;
        let mut skipped = 0usize;

        for tool in tools {
            if self.is_reserved(&tool.name) {
                reserved += 1;
                tracing::debug!(tool = %tool.name, "not mirroring reserved tool");
                continue;
            }

            let input_schema = match InputSchema::translate(&tool.name, &tool.input_schema) {
                Ok(schema) => schema,
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(tool = %tool.name, error = %err, "skipping tool with untranslatable schema");
                    continue;
                }
            };

            let descriptor = ToolDescriptor {
                name: tool.name,
                title: tool.title,
                description: tool.description,
                input_schema,
            };
            let mirrored = if descriptor.name == self.sandbox_open_tool {
                MirroredTool::SandboxOpen(descriptor)
            } else {
                MirroredTool::Passthrough(descriptor)
            };

            let name = mirrored.name().to_string();
            if !registry.insert(mirrored) {
                skipped += 1;
                tracing::warn!(tool = %name, "duplicate tool name in upstream catalog; keeping first");
            }
        }

        tracing::info!(
            total,
            mirrored = registry.len(),
            reserved,
            skipped,
            "mirrored upstream tool catalog"
        );
        registry
    }
}
