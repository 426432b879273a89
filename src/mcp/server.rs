use crate::constants::mcp::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::errors::{ErrorCode, McpError};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolInvoker;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

/// Newline-delimited JSON-RPC front end. Cheap to clone; clones share the invoker.
#[derive(Clone)]
pub struct McpServer {
    invoker: Arc<dyn ToolInvoker>,
    logger: Logger,
}

impl McpServer {
    pub fn new(invoker: Arc<dyn ToolInvoker>, logger: Logger) -> Self {
        Self {
            invoker,
            logger: logger.child("server"),
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": self.invoker.tools() })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let params = params
            .as_object()
            .ok_or_else(|| McpError::invalid_params("tools/call params must be an object"))?;
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| McpError::invalid_params("Missing tool name"))?;
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);
        let result = self.invoker.execute(name, args).await;
        serde_json::to_value(result)
            .map_err(|err| McpError::new(ErrorCode::InternalError, err.to_string()))
    }

    /// `None` for notifications and anything else that must not be answered.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.method.starts_with("notifications/") && request.is_notification() {
            return None;
        }
        let id = request.id.clone()?;
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::from_error(
                id,
                McpError::new(ErrorCode::InvalidRequest, "Invalid request"),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(&request.params).await,
            method if method.starts_with("notifications/") => Ok(serde_json::json!({})),
            _ => Err(McpError::new(ErrorCode::MethodNotFound, "Method not found")),
        };
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::from_error(id, err),
        })
    }

    /// Parses one input line; malformed input becomes a ready-made error response.
    pub fn parse_line(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
        let parsed: Value = serde_json::from_str(line).map_err(|_| {
            JsonRpcResponse::from_error(
                Value::Null,
                McpError::new(ErrorCode::ParseError, "Parse error"),
            )
        })?;
        let id = parsed.get("id").cloned().unwrap_or(Value::Null);
        serde_json::from_value(parsed).map_err(|_| {
            JsonRpcResponse::from_error(
                id,
                McpError::new(ErrorCode::InvalidRequest, "Invalid request"),
            )
        })
    }

    /// Reads requests until EOF. Each `tools/call` runs in its own task; a single writer
    /// task owns the output stream, so responses may arrive out of request order.
    pub async fn serve<R, W>(&self, input: R, output: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(output);
            while let Some(response) = rx.recv().await {
                let payload = serde_json::to_string(&response).unwrap_or_default();
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let request = match Self::parse_line(trimmed) {
                Ok(request) => request,
                Err(response) => {
                    self.logger.warn("rejected malformed request", None);
                    let _ = tx.send(response);
                    continue;
                }
            };

            if request.method == "tools/call" {
                let server = self.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_request(request).await {
                        let _ = tx.send(response);
                    }
                });
            } else if let Some(response) = self.handle_request(request).await {
                let _ = tx.send(response);
            }
        }

        // In-flight calls hold sender clones; the writer drains until the last one finishes.
        drop(tx);
        match writer_task.await {
            Ok(result) => result,
            Err(err) => Err(std::io::Error::new(std::io::ErrorKind::Other, err)),
        }
    }

    pub async fn run_stdio(&self) -> std::io::Result<()> {
        self.logger.info(
            "serving on stdio",
            Some(&serde_json::json!({"tools": self.invoker.tools().len()})),
        );
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}
