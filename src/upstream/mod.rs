//! Outbound side: the one MCP session this gateway holds with the backend.
//!
//! [`Upstream`] is the seam between the catalog/dispatch logic and the
//! transport. Production uses [`McpClient`]; tests plug in fakes.

pub mod client;
pub mod session;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::mcp::{CallToolParams, Tool};
use crate::types::Result;

pub use client::{HttpConnector, McpClient};
pub use session::{SessionManager, UpstreamSession};

/// An established backend session.
#[async_trait]
pub trait Upstream: Send + Sync + std::fmt::Debug {
    /// Full tool catalog, following pagination to the end.
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Forward one tool call. Resolves to the backend's raw `CallToolResult`.
    ///
    /// Gives up with `Error::Timeout` after `timeout` and with
    /// `Error::Cancelled` as soon as `cancel` fires.
    async fn call_tool(
        &self,
        params: CallToolParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value>;
}

/// Opens backend sessions. Called at most once per successful session.
#[async_trait]
pub trait UpstreamConnector: Send + Sync + std::fmt::Debug {
    async fn connect(&self, authorization: &str) -> Result<Arc<dyn Upstream>>;
}
