//! Inbound streamable-HTTP endpoint.
//!
//! Stateless: each POST is answered in full, either as JSON or as a short
//! SSE stream, and no server-initiated stream is offered.

use axum::extract::State;
use axum::http::header::{ACCEPT, ALLOW, AUTHORIZATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use bytes::Bytes;
use futures::future::join_all;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use super::transport::RequestTransport;
use crate::auth::{metadata, require_bearer, AuthInfo, BearerAuth, ClientRegistry};
use crate::catalog::{CallContext, ToolDispatcher};
use crate::mcp::jsonrpc::{self, JsonRpcError, JsonRpcId, JsonRpcResponse};
use crate::mcp::types::{
    negotiate_protocol_version, tool_error_result, CallToolParams, Implementation,
    InitializeResult, ListToolsResult,
};
use crate::paths::{PathVirtualizer, SandboxUploader};
use crate::types::{Config, Error};
use crate::upstream::{HttpConnector, SessionManager};

/// Shared state of the `/mcp` handler.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub sessions: Arc<SessionManager>,
    pub server_info: Implementation,
}

impl GatewayState {
    pub fn new(sessions: Arc<SessionManager>, server_info: Implementation) -> Self {
        Self {
            sessions,
            server_info,
        }
    }
}

/// Wire the production components for `config` and return the ready router.
pub fn build_gateway(config: &Config, http: reqwest::Client) -> Router {
    let connector = Arc::new(HttpConnector::new(
        http.clone(),
        config.upstream.mcp_url(),
        Implementation::new(&config.upstream.client_name, &config.server.server_version),
        config.upstream.connect_timeout,
    ));
    let uploader = Arc::new(SandboxUploader::new(
        http,
        config.upstream.upload_url(),
        &config.upstream.sandbox_root,
    ));
    let paths = Arc::new(PathVirtualizer::new(&config.paths));
    let sessions = Arc::new(SessionManager::new(
        connector,
        uploader,
        paths,
        &config.upstream,
    ));
    let server_info = Implementation::new(&config.server.server_name, &config.server.server_version);

    build_router(config, GatewayState::new(sessions, server_info))
}

/// Assemble the full HTTP surface: discovery documents plus `/mcp` behind the bearer gate.
pub fn build_router(config: &Config, state: GatewayState) -> Router {
    let gate = Arc::new(BearerAuth::new(
        ClientRegistry::new(config.auth.redirect_uri.clone()),
        config.auth.required_scopes.clone(),
        metadata::protected_resource_metadata_url(&config.server),
    ));

    let mcp = Router::new()
        .route(
            &config.server.mcp_path,
            post(handle_post).get(method_not_allowed).delete(method_not_allowed),
        )
        .route_layer(axum::middleware::from_fn_with_state(gate, require_bearer))
        .with_state(state);

    Router::new()
        .merge(metadata::routes(&config.server, &config.auth))
        .merge(mcp)
        .layer(TraceLayer::new_for_http())
}

async fn handle_post(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut transport = RequestTransport::new();
    let span = tracing::info_span!("mcp_request", transport_id = %transport.id());

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Bearer {}", auth.token));

    let session = match state.sessions.ensure_session(&authorization).await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(transport_id = %transport.id(), error = %err, "no upstream session");
            return internal_error_response();
        }
    };

    let messages = match parse_body(&body) {
        Ok(messages) => messages,
        Err(response) => return response,
    };
    if !messages.iter().any(Incoming::expects_response) {
        return StatusCode::ACCEPTED.into_response();
    }
    let batch = body_is_array(&body);

    let exchange = Exchange {
        dispatcher: session.dispatcher().clone(),
        server_info: state.server_info.clone(),
        ctx: CallContext::new(auth, transport.cancel_token()),
    };
    let outcome = transport
        .run(async move { exchange.handle_all(messages).await }.instrument(span))
        .await;

    match outcome {
        Ok(responses) => respond(&headers, responses, batch),
        Err(err) => {
            tracing::error!(transport_id = %transport.id(), error = %err, "request failed");
            internal_error_response()
        }
    }
}

async fn method_not_allowed() -> Response {
    let body = JsonRpcResponse::err(
        JsonRpcId::Null,
        JsonRpcError::new(jsonrpc::CONNECTION_CLOSED, "Method not allowed."),
    );
    let mut response = (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response();
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("POST"));
    response
}

/// `500` with the generic JSON-RPC internal error body.
pub fn internal_error_response() -> Response {
    let body = JsonRpcResponse::err(
        JsonRpcId::Null,
        JsonRpcError::new(jsonrpc::INTERNAL_ERROR, "Internal server error"),
    );
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// One inbound message after classification.
#[derive(Debug)]
enum Incoming {
    Request {
        id: JsonRpcId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
    },
    /// Replies to server-initiated requests; this gateway sends none.
    Response,
    Invalid {
        id: JsonRpcId,
        reason: String,
    },
}

impl Incoming {
    fn classify(value: Value) -> Self {
        let Value::Object(mut obj) = value else {
            return Incoming::Invalid {
                id: JsonRpcId::Null,
                reason: "message is not a JSON object".to_string(),
            };
        };
        let id = obj
            .get("id")
            .and_then(|v| serde_json::from_value::<JsonRpcId>(v.clone()).ok());

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(jsonrpc::JSONRPC_VERSION) {
            return Incoming::Invalid {
                id: id.unwrap_or(JsonRpcId::Null),
                reason: "jsonrpc must be \"2.0\"".to_string(),
            };
        }

        match (obj.remove("method"), id) {
            (Some(Value::String(method)), Some(id)) if id != JsonRpcId::Null => Incoming::Request {
                id,
                method,
                params: obj.remove("params"),
            },
            (Some(Value::String(method)), None) => Incoming::Notification { method },
            (None, Some(_)) if obj.contains_key("result") || obj.contains_key("error") => {
                Incoming::Response
            }
            (_, id) => Incoming::Invalid {
                id: id.unwrap_or(JsonRpcId::Null),
                reason: "not a JSON-RPC request, notification or response".to_string(),
            },
        }
    }

    fn expects_response(&self) -> bool {
        matches!(self, Incoming::Request { .. } | Incoming::Invalid { .. })
    }
}

fn parse_body(body: &[u8]) -> std::result::Result<Vec<Incoming>, Response> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "unparseable request body");
        rpc_error_response(
            StatusCode::BAD_REQUEST,
            JsonRpcError::new(jsonrpc::PARSE_ERROR, format!("Parse error: {}", e)),
        )
    })?;

    let values = match value {
        Value::Array(items) if items.is_empty() => {
            return Err(rpc_error_response(
                StatusCode::BAD_REQUEST,
                JsonRpcError::new(jsonrpc::INVALID_REQUEST, "Invalid Request: empty batch"),
            ))
        }
        Value::Array(items) => items,
        other => vec![other],
    };
    Ok(values.into_iter().map(Incoming::classify).collect())
}

fn body_is_array(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[')
}

fn rpc_error_response(status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::err(JsonRpcId::Null, error))).into_response()
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .any(|accept| accept.contains("text/event-stream"))
}

fn respond(headers: &HeaderMap, responses: Vec<JsonRpcResponse>, batch: bool) -> Response {
    if wants_event_stream(headers) {
        let events = responses.into_iter().map(|r| {
            Ok::<_, Infallible>(
                Event::default()
                    .event("message")
                    .data(serde_json::to_string(&r).unwrap_or_default()),
            )
        });
        return Sse::new(futures::stream::iter(events)).into_response();
    }

    if batch {
        Json(responses).into_response()
    } else {
        match responses.into_iter().next() {
            Some(single) => Json(single).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        }
    }
}

/// Request-scoped handling of a parsed body, run inside the transport task.
struct Exchange {
    dispatcher: ToolDispatcher,
    server_info: Implementation,
    ctx: CallContext,
}

impl Exchange {
    async fn handle_all(&self, messages: Vec<Incoming>) -> Vec<JsonRpcResponse> {
        let pending = messages.into_iter().map(|msg| self.handle(msg));
        join_all(pending).await.into_iter().flatten().collect()
    }

    async fn handle(&self, msg: Incoming) -> Option<JsonRpcResponse> {
        match msg {
            Incoming::Request { id, method, params } => {
                Some(match self.handle_request(&method, params).await {
                    Ok(result) => JsonRpcResponse::ok(id, result),
                    Err(error) => JsonRpcResponse::err(id, error),
                })
            }
            Incoming::Notification { method } => {
                tracing::debug!(method = %method, "ignoring client notification");
                None
            }
            Incoming::Response => None,
            Incoming::Invalid { id, reason } => Some(JsonRpcResponse::err(
                id,
                JsonRpcError::new(jsonrpc::INVALID_REQUEST, format!("Invalid Request: {}", reason)),
            )),
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(json!({})),
            "tools/list" => to_value(ListToolsResult {
                tools: self.dispatcher.list_tools(),
                next_cursor: None,
            }),
            "tools/call" => self.call_tool(params).await,
            other => Err(JsonRpcError::new(
                jsonrpc::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let requested = params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                JsonRpcError::new(jsonrpc::INVALID_PARAMS, "initialize requires protocolVersion")
            })?;

        to_value(InitializeResult {
            protocol_version: negotiate_protocol_version(requested).to_string(),
            capabilities: json!({ "tools": { "listChanged": false } }),
            server_info: self.server_info.clone(),
            instructions: None,
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| Error::invalid_params("tools/call requires params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| Error::invalid_params(format!("invalid tools/call params: {}", e)))
            })
            .map_err(|e| e.to_jsonrpc_error())?;
        let name = params.name.clone();

        match self.dispatcher.call(params, &self.ctx).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_tool_result_error() => {
                tracing::warn!(tool = %name, error = %err, "tool call failed");
                Ok(tool_error_result(err.to_string()))
            }
            Err(err) => {
                tracing::debug!(tool = %name, error = %err, "tool call rejected");
                Err(err.to_jsonrpc_error())
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| Error::from(e).to_jsonrpc_error())
}
