//! Model Context Protocol wire types.
//!
//! Shared by the inbound streamable-HTTP surface (`router`) and the
//! outbound client that talks to the sandbox backend (`upstream`).

pub mod jsonrpc;
pub mod sse;
pub mod types;

pub use jsonrpc::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse,
};
pub use types::{CallToolParams, Implementation, InitializeResult, ListToolsResult, Tool};
