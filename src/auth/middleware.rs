//! Bearer-token middleware for the MCP endpoint.

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::clients::{ClientRegistration, ClientRegistry};
use super::token::{decode_bearer, AuthInfo};
use crate::types::{Error, Result};

/// Shared state for [`require_bearer`].
#[derive(Debug, Clone)]
pub struct BearerAuth {
    clients: ClientRegistry,
    required_scopes: Vec<String>,
    resource_metadata_url: String,
}

impl BearerAuth {
    pub fn new(
        clients: ClientRegistry,
        required_scopes: Vec<String>,
        resource_metadata_url: impl Into<String>,
    ) -> Self {
        Self {
            clients,
            required_scopes,
            resource_metadata_url: resource_metadata_url.into(),
        }
    }

    /// Decode and check the request's bearer token as of `now_secs`.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        now_secs: i64,
    ) -> Result<(AuthInfo, ClientRegistration)> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| Error::malformed_token("Missing Authorization header"))?
            .to_str()
            .map_err(|_| Error::malformed_token("Authorization header is not ASCII"))?;

        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
                token.trim()
            }
            _ => {
                return Err(Error::malformed_token(
                    "Invalid Authorization header format, expected 'Bearer TOKEN'",
                ))
            }
        };

        let info = decode_bearer(token)?;

        if let Some(missing) = self.required_scopes.iter().find(|s| !info.has_scope(s)) {
            return Err(Error::InsufficientScope(missing.clone()));
        }
        if info.is_expired_at(now_secs) {
            return Err(Error::TokenExpired);
        }

        let client = self.clients.get_client(&info.client_id);
        Ok((info, client))
    }

    /// Build the 401/403 response for a failed check.
    pub fn reject(&self, err: &Error) -> Response {
        let (status, code) = match err {
            Error::InsufficientScope(_) => (StatusCode::FORBIDDEN, "insufficient_scope"),
            _ => (StatusCode::UNAUTHORIZED, "invalid_token"),
        };
        let description = err.to_string();

        let challenge = format!(
            "Bearer error=\"{}\", error_description=\"{}\", resource_metadata=\"{}\"",
            code,
            description.replace('"', "'"),
            self.resource_metadata_url
        );

        let mut response = (
            status,
            Json(serde_json::json!({
                "error": code,
                "error_description": description,
            })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Reject unauthenticated requests; stash [`AuthInfo`] and the client
/// registration in request extensions for downstream handlers.
pub async fn require_bearer(
    State(gate): State<Arc<BearerAuth>>,
    mut req: Request,
    next: Next,
) -> Response {
    let now = chrono::Utc::now().timestamp();
    match gate.authenticate(req.headers(), now) {
        Ok((info, client)) => {
            tracing::debug!(client_id = %info.client_id, "bearer token accepted");
            req.extensions_mut().insert(info);
            req.extensions_mut().insert(client);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "bearer token rejected");
            gate.reject(&err)
        }
    }
}
