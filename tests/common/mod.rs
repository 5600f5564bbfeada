//! Shared fixtures: a fake sandbox backend and a gateway wired to it.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use sandbox_gateway::auth::token::encode_unsigned;
use sandbox_gateway::router::build_gateway;
use sandbox_gateway::Config;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const FAKE_SESSION_ID: &str = "fake-session-1";

/// Everything the fake backend observed.
#[derive(Debug, Default)]
pub struct Backend {
    pub initializes: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub notifications: Mutex<Vec<Value>>,
    pub tool_calls: Mutex<Vec<Value>>,
    pub authorizations: Mutex<Vec<String>>,
    /// (Authorization header, raw multipart body)
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail_uploads: AtomicBool,
}

impl Backend {
    pub fn calls_to(&self, tool: &str) -> Vec<Value> {
        self.tool_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c["name"] == tool)
            .cloned()
            .collect()
    }

    pub fn notification_methods(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter_map(|n| n["method"].as_str().map(str::to_string))
            .collect()
    }
}

fn tool(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} from the fake backend", name),
        "inputSchema": {
            "type": "object",
            "properties": {
                "filepath": {"type": "string"},
                "address": {"type": "string"}
            }
        }
    })
}

fn rpc_result(id: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

async fn backend_mcp(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(msg): Json<Value>,
) -> Response {
    if let Some(auth) = headers.get("authorization").and_then(|h| h.to_str().ok()) {
        backend.authorizations.lock().unwrap().push(auth.to_string());
    }
    let method = msg["method"].as_str().unwrap_or_default().to_string();
    let id = msg.get("id").cloned();

    if method != "initialize"
        && headers.get("mcp-session-id").and_then(|h| h.to_str().ok()) != Some(FAKE_SESSION_ID)
    {
        return (StatusCode::BAD_REQUEST, "missing session").into_response();
    }

    let Some(id) = id else {
        backend.notifications.lock().unwrap().push(msg);
        return StatusCode::ACCEPTED.into_response();
    };

    match method.as_str() {
        "initialize" => {
            backend.initializes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            let body = rpc_result(
                &id,
                json!({
                    "protocolVersion": "2025-06-18",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake-backend", "version": "0.0.1"}
                }),
            );
            ([("mcp-session-id", FAKE_SESSION_ID)], Json(body)).into_response()
        }
        "tools/list" => {
            backend.list_calls.fetch_add(1, Ordering::SeqCst);
            let page = match msg["params"]["cursor"].as_str() {
                None => json!({
                    "tools": [tool("sandbox_create"), tool("workspace_list"), tool("ghidra_open_server")],
                    "nextCursor": "page-2"
                }),
                Some(_) => json!({
                    "tools": [tool("ghidra_decompile"), tool("failing_tool"), tool("slow_tool")]
                }),
            };
            Json(rpc_result(&id, page)).into_response()
        }
        "tools/call" => {
            backend.tool_calls.lock().unwrap().push(msg["params"].clone());
            let name = msg["params"]["name"].as_str().unwrap_or_default();
            match name {
                "slow_tool" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Json(rpc_result(&id, json!({"content": []}))).into_response()
                }
                "failing_tool" => Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32050, "message": "backend exploded", "data": {"detail": 1}}
                }))
                .into_response(),
                _ => {
                    let result = rpc_result(
                        &id,
                        json!({
                            "content": [{"type": "text", "text": "ok"}],
                            "arguments": msg["params"]["arguments"].clone()
                        }),
                    );
                    // Answer over SSE, preceded by a progress notification.
                    let body = format!(
                        "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
                        json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}),
                        result
                    );
                    ([("content-type", "text/event-stream")], body).into_response()
                }
            }
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .into_response(),
    }
}

async fn backend_upload(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    backend.uploads.lock().unwrap().push((auth, body.to_vec()));

    if backend.fail_uploads.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage offline").into_response();
    }
    Json(json!({"pathname": "abc123"})).into_response()
}

/// Start the fake backend on an ephemeral port.
pub async fn start_backend() -> (SocketAddr, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/mcp", post(backend_mcp))
        .route("/workspace/upload", post(backend_upload))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, backend)
}

/// Start a gateway whose backend lives at `upstream_base`.
pub async fn start_gateway(upstream_base: &str) -> String {
    let mut config = Config::default();
    config.upstream.base_url = upstream_base.to_string();
    config.upstream.connect_timeout = Duration::from_secs(5);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.server.port = addr.port();

    let app = build_gateway(&config, reqwest::Client::new());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Backend plus a gateway in front of it.
pub async fn start_stack() -> (String, Arc<Backend>) {
    let (addr, backend) = start_backend().await;
    let gateway = start_gateway(&format!("http://{}", addr)).await;
    (gateway, backend)
}

/// A structurally valid, unsigned bearer token.
pub fn token() -> String {
    encode_unsigned(
        &json!({"typ": "JWT", "alg": "RS256"}),
        &json!({"client_id": "test-client", "scope": "openid profile", "exp": 4_102_444_800i64}),
    )
}

pub fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

/// POST a JSON-RPC body to the gateway's `/mcp` as a JSON-only client.
pub async fn post_mcp(gateway: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/mcp", gateway))
        .bearer_auth(token())
        .header("accept", "application/json")
        .json(body)
        .send()
        .await
        .unwrap()
}

/// POST one request and return the decoded JSON-RPC response.
pub async fn call(gateway: &str, id: i64, method: &str, params: Value) -> Value {
    let response = post_mcp(gateway, &rpc(id, method, params)).await;
    assert_eq!(response.status(), StatusCode::OK.as_u16());
    response.json().await.unwrap()
}
