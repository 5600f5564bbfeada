//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Each
//! variant maps onto exactly one outward surface: an HTTP auth rejection,
//! a JSON-RPC error, or a tool-level error result.

use thiserror::Error;

use crate::mcp::jsonrpc::{self, JsonRpcError};

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// Bearer token is not three base64url JSON segments.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Token header `typ` is not `JWT`.
    #[error("unsupported token type: {0}")]
    UnsupportedTokenType(String),

    /// A required payload claim is absent or has the wrong type.
    #[error("missing claim: {0}")]
    MissingClaim(String),

    /// Token `exp` lies in the past.
    #[error("token has expired")]
    TokenExpired,

    /// Token lacks a scope the gateway is configured to require.
    #[error("insufficient scope: {0}")]
    InsufficientScope(String),

    /// Outbound session could not be established (map to HTTP 500).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A backend tool schema could not be turned into a local validator.
    /// Only ever logged; the tool is left out of the mirror.
    #[error("schema translation failed for tool '{tool}': {reason}")]
    SchemaTranslation { tool: String, reason: String },

    /// Sandbox upload did not produce a usable remote path.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Backend answered a forwarded call with a JSON-RPC error (passed through).
    #[error("tool invocation error: {0}")]
    ToolInvocation(JsonRpcError),

    /// No mirrored tool with this name (map to INVALID_PARAMS).
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments failed schema validation (map to INVALID_PARAMS).
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Upstream spoke something that is not valid MCP.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Forwarded call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Caller went away before the call finished.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP errors.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures of the bearer check (HTTP 401/403 rather than JSON-RPC).
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedToken(_)
                | Error::UnsupportedTokenType(_)
                | Error::MissingClaim(_)
                | Error::TokenExpired
                | Error::InsufficientScope(_)
        )
    }

    /// True when the failure belongs inside a `CallToolResult` with
    /// `isError: true` instead of a JSON-RPC error object.
    pub fn is_tool_result_error(&self) -> bool {
        matches!(
            self,
            Error::UploadFailed(_) | Error::Timeout(_) | Error::Io(_) | Error::Http(_)
        )
    }

    /// Convert to a JSON-RPC error object.
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Error::ToolInvocation(err) => err.clone(),
            Error::ToolNotFound(name) => {
                JsonRpcError::new(jsonrpc::INVALID_PARAMS, format!("Tool {} not found", name))
            }
            Error::InvalidParams(msg) => JsonRpcError::new(jsonrpc::INVALID_PARAMS, msg.clone()),
            Error::Timeout(msg) => JsonRpcError::new(jsonrpc::REQUEST_TIMEOUT, msg.clone()),
            Error::Cancelled(msg) => JsonRpcError::new(jsonrpc::CONNECTION_CLOSED, msg.clone()),
            _ => JsonRpcError::new(jsonrpc::INTERNAL_ERROR, "Internal server error"),
        }
    }
}

// Convenience constructors
impl Error {
    pub fn malformed_token(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim(claim.into())
    }

    pub fn upstream_unavailable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn schema_translation(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaTranslation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

impl From<Error> for JsonRpcError {
    fn from(err: Error) -> Self {
        err.to_jsonrpc_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_passes_through_unchanged() {
        let upstream = JsonRpcError::new(-32099, "backend exploded")
            .with_data(serde_json::json!({"detail": "disk full"}));
        let err = Error::ToolInvocation(upstream.clone());
        assert_eq!(err.to_jsonrpc_error(), upstream);
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err = Error::upstream_unavailable("connect refused to 10.0.0.3");
        let rpc = err.to_jsonrpc_error();
        assert_eq!(rpc.code, jsonrpc::INTERNAL_ERROR);
        assert_eq!(rpc.message, "Internal server error");
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::TokenExpired.is_auth_error());
        assert!(Error::missing_claim("exp").is_auth_error());
        assert!(!Error::upload_failed("x").is_auth_error());
        assert!(Error::upload_failed("x").is_tool_result_error());
        assert!(!Error::ToolNotFound("x".into()).is_tool_result_error());
    }
}
