//! MCP client over the streamable HTTP transport.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Upstream, UpstreamConnector};
use crate::mcp::jsonrpc::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};
use crate::mcp::types::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, ListToolsParams,
    ListToolsResult, Tool, PROTOCOL_VERSION_LATEST,
};
use crate::mcp::{sse, JsonRpcId, JsonRpcResponse};
use crate::types::{Error, Result};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";

/// Guards against a backend that keeps handing out cursors.
const MAX_LIST_PAGES: usize = 100;

/// An initialized MCP session with the backend.
///
/// The `Authorization` value captured at connect time is sent on every
/// request for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct McpClient {
    http: reqwest::Client,
    endpoint: String,
    authorization: String,
    protocol_version: String,
    session_id: Option<String>,
    server_info: Option<Implementation>,
    request_timeout: Duration,
}

impl McpClient {
    /// Run the `initialize` handshake and return a ready client.
    pub async fn connect(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        authorization: impl Into<String>,
        client_info: Implementation,
        request_timeout: Duration,
    ) -> Result<Self> {
        let mut client = Self {
            http,
            endpoint: endpoint.into(),
            authorization: authorization.into(),
            protocol_version: PROTOCOL_VERSION_LATEST.to_string(),
            session_id: None,
            server_info: None,
            request_timeout,
        };

        let params = serde_json::to_value(InitializeParams::new(client_info))?;
        let (result, session_id) = client
            .send_request(new_request_id(), "initialize", Some(params), Some(request_timeout))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| Error::protocol(format!("invalid initialize result: {}", e)))?;

        client.session_id = session_id;
        client.protocol_version = init.protocol_version;
        client.server_info = Some(init.server_info);

        client.notify("notifications/initialized", None).await?;

        tracing::info!(
            endpoint = %client.endpoint,
            protocol_version = %client.protocol_version,
            session_id = client.session_id.as_deref().unwrap_or("-"),
            "upstream MCP session initialized"
        );
        Ok(client)
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, &self.authorization)
            .header(ACCEPT, "application/json, text/event-stream")
            .header(PROTOCOL_HEADER, &self.protocol_version);
        if let Some(sid) = &self.session_id {
            req = req.header(SESSION_HEADER, sid);
        }
        req
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let msg = JsonRpcNotification::new(method, params);
        let resp = self
            .post()
            .timeout(self.request_timeout)
            .json(&msg)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Error::protocol(format!(
            "notification {} rejected with HTTP {}",
            method, status
        )))
    }

    /// Fire-and-forget `notifications/cancelled` for an abandoned request.
    fn spawn_cancel_notice(&self, request_id: JsonRpcId, reason: &'static str) {
        let client = self.clone();
        tokio::spawn(async move {
            let params = serde_json::json!({ "requestId": request_id, "reason": reason });
            if let Err(e) = client.notify("notifications/cancelled", Some(params)).await {
                tracing::warn!(request_id = %request_id, error = %e, "failed to notify upstream of cancellation");
            }
        });
    }

    /// Send one request and return its `result` plus any session id header.
    async fn send_request(
        &self,
        id: JsonRpcId,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<(Value, Option<String>)> {
        let msg = JsonRpcRequest::new(id.clone(), method, params);
        let mut req = self.post().json(&msg);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        if status == StatusCode::ACCEPTED {
            return Err(Error::protocol(format!(
                "upstream answered {} with 202 and no response",
                method
            )));
        }
        if !status.is_success() {
            return Err(Error::protocol(format!(
                "upstream answered {} with HTTP {}",
                method, status
            )));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text().await?;
        tracing::debug!(method, content_type = %content_type, bytes = body.len(), "upstream response");

        let response = find_response(&content_type, &body, &id)?;
        if let Some(err) = response.error {
            return Err(Error::ToolInvocation(err));
        }
        let result = response
            .result
            .ok_or_else(|| Error::protocol(format!("{} response has neither result nor error", method)))?;
        Ok((result, session_id))
    }
}

#[async_trait]
impl Upstream for McpClient {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = serde_json::to_value(ListToolsParams {
                cursor: cursor.take(),
            })?;
            let (result, _) = self
                .send_request(
                    new_request_id(),
                    "tools/list",
                    Some(params),
                    Some(self.request_timeout),
                )
                .await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| Error::protocol(format!("invalid tools/list result: {}", e)))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        Err(Error::protocol(format!(
            "tools/list did not finish within {} pages",
            MAX_LIST_PAGES
        )))
    }

    async fn call_tool(
        &self,
        params: CallToolParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let id = new_request_id();
        let name = params.name.clone();
        let body = serde_json::to_value(&params)?;
        let call = self.send_request(id.clone(), "tools/call", Some(body), None);

        tokio::select! {
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result.map(|(value, _)| value),
                Err(_) => {
                    self.spawn_cancel_notice(id, "Request timed out");
                    Err(Error::timeout(format!(
                        "tool '{}' did not answer within {}s",
                        name,
                        timeout.as_secs()
                    )))
                }
            },
            _ = cancel.cancelled() => {
                tracing::info!(tool = %name, request_id = %id, "forwarded call cancelled by caller");
                self.spawn_cancel_notice(id, "Client cancelled the request");
                Err(Error::cancelled(format!("tool '{}' cancelled", name)))
            }
        }
    }
}

/// Opens [`McpClient`] sessions against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    endpoint: String,
    client_info: Implementation,
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        client_info: Implementation,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            client_info,
            request_timeout,
        }
    }
}

#[async_trait]
impl UpstreamConnector for HttpConnector {
    async fn connect(&self, authorization: &str) -> Result<Arc<dyn Upstream>> {
        let client = McpClient::connect(
            self.http.clone(),
            self.endpoint.clone(),
            authorization,
            self.client_info.clone(),
            self.request_timeout,
        )
        .await?;
        Ok(Arc::new(client))
    }
}

fn new_request_id() -> JsonRpcId {
    JsonRpcId::String(Uuid::new_v4().to_string())
}

/// Locate the response to request `id` in a JSON or SSE body.
///
/// SSE bodies may carry notifications (progress, logging) before the response.
fn find_response(content_type: &str, body: &str, id: &JsonRpcId) -> Result<JsonRpcResponse> {
    let payloads: Vec<Value> = if content_type.starts_with("text/event-stream") {
        sse::decode_events(body)
            .iter()
            .filter_map(|event| serde_json::from_str::<Value>(event).ok())
            .collect()
    } else if content_type.is_empty() || content_type.starts_with("application/json") {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::protocol(format!("invalid JSON from upstream: {}", e)))?;
        vec![value]
    } else {
        return Err(Error::protocol(format!(
            "unsupported upstream content-type: {}",
            content_type
        )));
    };

    payloads
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items,
            other => vec![other],
        })
        .filter_map(|v| serde_json::from_value::<JsonRpcMessage>(v).ok())
        .find_map(|msg| match msg {
            JsonRpcMessage::Response(r) if &r.id == id => Some(r),
            _ => None,
        })
        .ok_or_else(|| Error::protocol(format!("no response for request {} in upstream body", id)))
}
