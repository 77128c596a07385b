//! Stdio tool server
//!
//! Reads newline-delimited JSON-RPC requests, answers protocol methods inline
//! and runs each `tools/call` on its own task. Responses from every task go
//! through one writer task, so output lines never interleave.

use crate::config::McpConfig;
use crate::dispatch::{ArgMap, Router, Surface, OPERATIONS};
use crate::mcp::protocol::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, MCP_PROTOCOL_VERSION,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tool descriptors, one per operation
pub fn tool_descriptors() -> Vec<Value> {
    OPERATIONS
        .iter()
        .map(|op| {
            json!({
                "name": op.name,
                "description": op.description,
                "inputSchema": {"type": "object"},
            })
        })
        .collect()
}

/// Tool server over a shared router
pub struct McpServer {
    router: Arc<Router>,
    name: String,
    calls: Arc<Semaphore>,
}

impl McpServer {
    pub fn new(router: Arc<Router>, config: &McpConfig) -> Self {
        Self {
            router,
            name: config.server_name.clone(),
            calls: Arc::new(Semaphore::new(config.max_concurrent_calls.max(1))),
        }
    }

    /// Serve until `reader` reaches EOF, then drain in-flight calls
    pub async fn run<R, W>(self: Arc<Self>, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));
        let mut in_flight = JoinSet::new();

        info!("Tool server '{}' ready on stdio", self.name);

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request = match parse_request(line) {
                Ok(request) => request,
                Err(response) => {
                    let _ = tx.send(*response);
                    continue;
                }
            };

            if request.method == "tools/call" && !request.is_notification() {
                let permit = match Arc::clone(&self.calls).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let server = Arc::clone(&self);
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    let response = server.call_tool(request.id, request.params).await;
                    let _ = tx.send(response);
                });
            } else if let Some(response) = self.handle_message(request).await {
                let _ = tx.send(response);
            }
        }

        while in_flight.join_next().await.is_some() {}
        drop(tx);

        info!("Tool server input closed");
        match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }

    /// Answer one request; `None` for notifications
    pub async fn handle_message(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!("Notification {}", request.method);
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                request.id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": self.name,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => JsonRpcResponse::success(request.id, json!({"tools": tool_descriptors()})),
            "tools/call" => self.call_tool(request.id, request.params).await,
            other => {
                warn!("Unknown method {}", other);
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                )
            }
        };
        Some(response)
    }

    /// Run one tool through the router
    pub async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or_else(|| json!({}));
        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name"),
        };
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => ArgMap::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, "Tool arguments must be an object")
            }
        };

        match self.router.dispatch(Surface::Protocol, &name, &arguments).await {
            Ok(rendered) => JsonRpcResponse::success(
                id,
                json!({"content": [{"type": "text", "text": rendered.pretty()}]}),
            ),
            Err(e) => {
                let request_id = Uuid::new_v4().to_string();
                error!(
                    request_id = %request_id,
                    tool = %name,
                    code = e.code(),
                    "Tool call failed: {}",
                    e
                );
                JsonRpcResponse::error_with_data(
                    id,
                    e.rpc_code(),
                    e.to_string(),
                    Some(json!({
                        "code": e.code(),
                        "field": e.field(),
                        "requestId": request_id,
                    })),
                )
            }
        }
    }
}

/// Parse one line; a ready-made error response when it is not a request
fn parse_request(line: &str) -> Result<JsonRpcRequest, Box<JsonRpcResponse>> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        Box::new(JsonRpcResponse::error(
            None,
            PARSE_ERROR,
            format!("Parse error: {}", e),
        ))
    })?;

    let id = value.get("id").cloned();
    let has_id = value.as_object().is_some_and(|o| o.contains_key("id"));
    let mut request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
        Box::new(JsonRpcResponse::error(
            id,
            INVALID_REQUEST,
            format!("Invalid request: {}", e),
        ))
    })?;

    // `"id": null` is still a request, only a missing id marks a notification
    if has_id && request.id.is_none() {
        request.id = Some(Value::Null);
    }
    Ok(request)
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::RawSample;
    use crate::store::{MemoryStore, StoreHandle};
    use chrono::{Duration, Utc};
    use tokio::io::AsyncReadExt;

    fn server(store: MemoryStore) -> Arc<McpServer> {
        let router = Arc::new(Router::new(StoreHandle::from_store(Arc::new(store))));
        Arc::new(McpServer::new(router, &McpConfig::default()))
    }

    async fn run(server: Arc<McpServer>, input: &str) -> Vec<Value> {
        let (mut client, server_end) = tokio::io::duplex(1 << 20);
        server.run(input.as_bytes(), server_end).await.unwrap();

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    fn by_id(responses: &[Value], id: i64) -> &Value {
        responses
            .iter()
            .find(|r| r["id"] == json!(id))
            .unwrap_or_else(|| panic!("no response with id {}", id))
    }

    #[tokio::test]
    async fn test_session() {
        let store = MemoryStore::new().with_sample(
            "HKQuantityTypeIdentifierStepCount",
            RawSample::at(12345.0, Utc::now() - Duration::hours(5)),
        );
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"health_read_steps","arguments":{}}}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"health_query_stats","arguments":{}}}"#,
            r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#,
            r#"{"jsonrpc":"2.0","id":6,"method":"ping"}"#,
            "",
        ]
        .join("\n");

        let responses = run(server(store), &input).await;
        assert_eq!(responses.len(), 6);

        let init = by_id(&responses, 1);
        assert_eq!(init["result"]["protocolVersion"], json!("2024-11-05"));
        assert_eq!(init["result"]["serverInfo"]["name"], json!("healthbridge"));

        let tools = by_id(&responses, 2)["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), OPERATIONS.len());
        assert_eq!(tools[0]["inputSchema"], json!({"type": "object"}));

        let text = by_id(&responses, 3)["result"]["content"][0]["text"]
            .as_str()
            .unwrap();
        let doc: Value = serde_json::from_str(text).unwrap();
        assert_eq!(doc["steps"], json!(12345));

        let failed = by_id(&responses, 4);
        assert_eq!(failed["error"]["code"], json!(-32602));
        assert_eq!(failed["error"]["data"]["field"], json!("type"));
        assert_eq!(failed["error"]["data"]["code"], json!("INVALID_PARAMS"));

        assert_eq!(by_id(&responses, 5)["error"]["code"], json!(-32601));
        assert_eq!(by_id(&responses, 6)["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_errors() {
        let input = "{not json\n{\"jsonrpc\":\"2.0\",\"id\":9}\n";
        let responses = run(server(MemoryStore::new()), input).await;
        assert_eq!(responses.len(), 2);

        let parse = responses
            .iter()
            .find(|r| r["error"]["code"] == json!(-32700))
            .unwrap();
        assert_eq!(parse["id"], Value::Null);

        let invalid = by_id(&responses, 9);
        assert_eq!(invalid["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn test_null_id_is_answered() {
        let input = [
            r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":null,"method":"tools/call","params":{"name":"health_list_types"}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        ]
        .join("\n");

        let responses = run(server(MemoryStore::new()), &input).await;
        assert_eq!(responses.len(), 2);
        for response in &responses {
            assert_eq!(response["id"], Value::Null);
        }
        assert!(responses.iter().any(|r| r["result"] == json!({})));
        assert!(responses.iter().any(|r| r["result"]["content"].is_array()));
    }

    #[test]
    fn test_parse_request_keeps_null_id() {
        let request = parse_request(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert_eq!(request.id, Some(Value::Null));
        assert!(!request.is_notification());

        let note = parse_request(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(note.is_notification());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let server = server(MemoryStore::new());
        let response = server
            .call_tool(
                Some(json!(1)),
                Some(json!({"name": "health_teleport", "arguments": {}})),
            )
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.data.unwrap()["code"], json!("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_overlapping_calls_all_answered() {
        let mut lines = Vec::new();
        for id in 1..=20 {
            lines.push(format!(
                r#"{{"jsonrpc":"2.0","id":{},"method":"tools/call","params":{{"name":"health_list_types"}}}}"#,
                id
            ));
        }
        let responses = run(server(MemoryStore::new()), &lines.join("\n")).await;
        assert_eq!(responses.len(), 20);
        for id in 1..=20 {
            assert!(by_id(&responses, id)["result"].is_object());
        }
    }
}
