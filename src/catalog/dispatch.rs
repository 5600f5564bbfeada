//! Uniform tool dispatch: validate → upload/rewrite → forward.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::registry::{MirroredTool, ToolRegistry};
use crate::auth::AuthInfo;
use crate::mcp::{CallToolParams, Tool};
use crate::paths::{FileUploader, PathVirtualizer};
use crate::types::{Error, Result};
use crate::upstream::Upstream;

/// Per-call context handed down from the inbound transport.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub auth: AuthInfo,
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new(auth: AuthInfo, cancel: CancellationToken) -> Self {
        Self { auth, cancel }
    }
}

/// Routes calls for every mirrored tool of one upstream session.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    upstream: Arc<dyn Upstream>,
    uploader: Arc<dyn FileUploader>,
    paths: Arc<PathVirtualizer>,
    filepath_field: String,
    call_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        upstream: Arc<dyn Upstream>,
        uploader: Arc<dyn FileUploader>,
        paths: Arc<PathVirtualizer>,
        filepath_field: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            upstream,
            uploader,
            paths,
            filepath_field: filepath_field.into(),
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.registry.list()
    }

    /// Run one `tools/call`. The backend's `CallToolResult` is returned verbatim.
    pub async fn call(&self, params: CallToolParams, ctx: &CallContext) -> Result<Value> {
        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| Error::ToolNotFound(params.name.clone()))?;

        let mut args = match params.arguments {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(Error::invalid_params(format!(
                    "Invalid arguments for tool {}: expected an object, got {}",
                    params.name, other
                )))
            }
        };

        let descriptor = tool.descriptor();
        let args_value = Value::Object(args.clone());
        descriptor.input_schema.validate(&descriptor.name, &args_value)?;

        let local_path = args
            .get(&self.filepath_field)
            .and_then(Value::as_str)
            .map(str::to_string);

        if let (MirroredTool::SandboxOpen(_), Some(local)) = (tool, &local_path) {
            self.upload(local, ctx).await?;
        }

        if let Some(local) = local_path {
            if let Some(remote) = self.paths.lookup(&local).await {
                tracing::debug!(tool = %descriptor.name, local = %local, remote = %remote, "rewrote filepath");
                args.insert(self.filepath_field.clone(), Value::String(remote));
            }
        }

        let forwarded = CallToolParams {
            name: descriptor.name.clone(),
            arguments: Some(Value::Object(args)),
        };
        tracing::debug!(tool = %forwarded.name, client_id = %ctx.auth.client_id, "forwarding tool call");
        self.upstream
            .call_tool(forwarded, self.call_timeout, &ctx.cancel)
            .await
    }

    /// Upload as the caller and record the mapping. Nothing is recorded on failure.
    async fn upload(&self, local: &str, ctx: &CallContext) -> Result<()> {
        let remote = tokio::select! {
            result = self.uploader.upload(local, &ctx.auth.token) => result?,
            _ = ctx.cancel.cancelled() => {
                return Err(Error::cancelled(format!("upload of {} cancelled", local)));
            }
        };
        tracing::info!(local = %local, remote = %remote, "file uploaded to sandbox");
        self.paths.record(local, remote).await;
        Ok(())
    }
}
