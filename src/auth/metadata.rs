//! OAuth discovery documents.
//!
//! Static metadata only. The authorization server itself lives behind the
//! issuer; the gateway just points clients at it.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::types::{AuthConfig, ServerConfig};

const PROTECTED_RESOURCE_WELL_KNOWN: &str = "/.well-known/oauth-protected-resource";
const AUTHORIZATION_SERVER_WELL_KNOWN: &str = "/.well-known/oauth-authorization-server";

/// RFC 8414 authorization server metadata.
pub fn authorization_server_metadata(auth: &AuthConfig) -> Value {
    let issuer = auth.issuer_url.trim_end_matches('/');
    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{}/authorize", issuer),
        "token_endpoint": format!("{}/token", issuer),
        "revocation_endpoint": format!("{}/revoke", issuer),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["client_secret_post"],
        "revocation_endpoint_auth_methods_supported": ["client_secret_post"],
        "scopes_supported": auth.scopes_supported,
    })
}

/// RFC 9728 protected resource metadata for the MCP endpoint.
pub fn protected_resource_metadata(server: &ServerConfig, auth: &AuthConfig) -> Value {
    json!({
        "resource": server.resource_url(),
        "authorization_servers": [auth.issuer_url.trim_end_matches('/')],
        "scopes_supported": auth.scopes_supported,
    })
}

/// Path at which the protected resource metadata is served.
pub fn protected_resource_metadata_path(server: &ServerConfig) -> String {
    format!("{}{}", PROTECTED_RESOURCE_WELL_KNOWN, server.mcp_path)
}

/// Absolute URL advertised in `WWW-Authenticate: ... resource_metadata=`.
pub fn protected_resource_metadata_url(server: &ServerConfig) -> String {
    format!(
        "{}{}",
        server.public_base_url(),
        protected_resource_metadata_path(server)
    )
}

/// Unauthenticated router serving both discovery documents.
pub fn routes(server: &ServerConfig, auth: &AuthConfig) -> Router {
    let as_doc = Arc::new(authorization_server_metadata(auth));
    let pr_doc = Arc::new(protected_resource_metadata(server, auth));

    Router::new()
        .route(
            AUTHORIZATION_SERVER_WELL_KNOWN,
            get(move || {
                let doc = as_doc.clone();
                async move { Json((*doc).clone()) }
            }),
        )
        .route(
            &protected_resource_metadata_path(server),
            get(move || {
                let doc = pr_doc.clone();
                async move { Json((*doc).clone()) }
            }),
        )
}
