//! MCP transport: newline-delimited JSON-RPC 2.0 over a byte stream.
//!
//! Each line read is one request or notification. Tool calls run on their
//! own tasks so a long `wait_for_completion` query never blocks `ping` or
//! other calls; a single writer task serializes responses back out.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::tools::{ToolError, ToolRouter};
use crate::error::{Result, ServiceError};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "athena-mcp";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

const RESPONSE_CHANNEL_CAPACITY: usize = 64;

/// An incoming JSON-RPC message. Messages without an `id` are notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// An outgoing JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// MCP server exposing the Athena tools.
#[derive(Clone)]
pub struct McpServer {
    router: Arc<ToolRouter>,
    shutdown: CancellationToken,
}

impl McpServer {
    /// Creates a server. Cancelling `shutdown` stops the read loop and
    /// abandons any in-flight polling waits.
    pub fn new(router: ToolRouter, shutdown: CancellationToken) -> Self {
        Self {
            router: Arc::new(router),
            shutdown,
        }
    }

    /// Handles one line of input. Returns `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding unparseable message: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };
        match parse_request(message) {
            Ok(request) => self.handle_request(request).await,
            Err(response) => Some(response),
        }
    }

    /// Dispatches a parsed request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!("Notification: {}", request.method);
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            ));
        }

        debug!("Request {}: {}", id, request.method);
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result(&request.params)),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": self.router.list_tools() }),
            ),
            "tools/call" => self.handle_tool_call(id, request.params).await,
            "resources/list" => JsonRpcResponse::success(id, json!({ "resources": [] })),
            "prompts/list" => JsonRpcResponse::success(id, json!({ "prompts": [] })),
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {e}"))
            }
        };

        info!("Tool call: {}", params.name);
        match self.router.call(&params.name, params.arguments).await {
            Ok(output) => JsonRpcResponse::success(id, tool_result(&output, false)),
            Err(ToolError::UnknownTool(name)) => {
                JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Unknown tool: {name}"))
            }
            Err(ToolError::Service(e)) => {
                info!("Tool {} failed: {}: {}", params.name, e.category(), e);
                JsonRpcResponse::success(id, tool_result(&e.to_json(), true))
            }
        }
    }

    /// Serves requests from `reader` until EOF or shutdown, writing one
    /// response per line to `writer`.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_CHANNEL_CAPACITY);
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let mut lines = BufReader::new(reader).lines();

        info!("MCP server ready");
        loop {
            let line = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested; no longer reading requests");
                    break;
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read request: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(_) => {
                    if let Some(response) = self.handle_message(&line).await {
                        let _ = tx.send(response).await;
                    }
                    continue;
                }
            };

            if request.method == "tools/call" {
                let server = self.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_request(request).await {
                        let _ = tx.send(response).await;
                    }
                });
            } else if let Some(response) = self.handle_request(request).await {
                let _ = tx.send(response).await;
            }
        }

        // Pending waits return their last observation once cancelled.
        self.shutdown.cancel();
        drop(tx);

        writer_task
            .await
            .map_err(|e| ServiceError::internal(format!("Response writer panicked: {e}")))?
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)
            .map_err(|e| ServiceError::protocol(format!("Failed to encode response: {e}")))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .map_err(|e| ServiceError::protocol(format!("Failed to write response: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| ServiceError::protocol(format!("Failed to flush response: {e}")))?;
    }
    writer
        .shutdown()
        .await
        .map_err(|e| ServiceError::protocol(format!("Failed to close output: {e}")))
}

/// Decodes a JSON value into a request, answering `Invalid Request` when it
/// is well-formed JSON but not a request object.
fn parse_request(message: Value) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let id = message.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(message).map_err(|e| {
        warn!("Rejecting malformed request: {}", e);
        JsonRpcResponse::failure(id, INVALID_REQUEST, format!("Invalid Request: {e}"))
    })
}

fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tool_result(payload: &Value, is_error: bool) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": payload.to_string()
        }],
        "isError": is_error
    })
}
