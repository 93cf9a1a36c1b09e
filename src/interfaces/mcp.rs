use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_router, ErrorData as McpError, ServerHandler,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::{
    application::{dtos::AskRequest, ComplaintService},
    domain::DomainError,
};

const ASK_TOOL: &str = "ask_complaints";

#[derive(Clone)]
pub struct ComplaintsMcpServer {
    service: Arc<ComplaintService>,
    tool_router: ToolRouter<Self>,
}

impl ComplaintsMcpServer {
    pub fn new(service: Arc<ComplaintService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    async fn answer(&self, payload: AskRequest) -> Result<CallToolResult, McpError> {
        let service = Arc::clone(&self.service);
        let response = task::spawn_blocking(move || {
            if payload.direct {
                service.ask_direct(&payload.query)
            } else {
                service.ask(&payload.query)
            }
        })
        .await
        .map_err(|err| internal_error(err.to_string()))?
        .map_err(map_domain_error)?;

        let value =
            serde_json::to_value(response).map_err(|err| internal_error(err.to_string()))?;
        Ok(CallToolResult::structured(value))
    }
}

#[tool_router]
impl ComplaintsMcpServer {
    #[tool(
        name = "ask_complaints",
        description = "Answer a question about customer complaints. Filters on client name, region and complaint date are inferred from the question."
    )]
    async fn ask_complaints(
        &self,
        Parameters(payload): Parameters<AskRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.answer(payload).await
    }
}

impl ServerHandler for ComplaintsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "complaint-rag".into(),
                title: Some("Complaints Assistant".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Call ask_complaints with the user's question verbatim. Set `direct` to true \
                 for a single-shot answer without tool orchestration. A response with status \
                 `incomplete` was cut off by the round limit; say so rather than guessing."
                    .into(),
            ),
        }
    }
}

/// Validation problems are reported to the client; everything else gets a
/// generic message and the detail goes to the log.
fn map_domain_error(err: DomainError) -> McpError {
    match err {
        DomainError::Validation(msg) | DomainError::LimitExceeded(msg) => {
            McpError::invalid_params("invalid request", Some(json!({ "detail": msg })))
        }
        other => {
            error!(target: "complaint_rag::mcp", error = %other, "request failed");
            McpError::internal_error("unable to answer right now", None)
        }
    }
}

fn internal_error(message: impl Into<String>) -> McpError {
    let message = message.into();
    error!(target: "complaint_rag::mcp", error = %message, "worker failed");
    McpError::internal_error("internal MCP server error", None)
}

/// Serves newline-delimited JSON-RPC on stdin/stdout until the client closes
/// the stream.
pub async fn run_mcp_stdio_server(service: Arc<ComplaintService>) -> Result<()> {
    info!(target: "complaint_rag::mcp", "starting MCP stdio server");

    let server = ComplaintsMcpServer::new(service);
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!(target: "complaint_rag::mcp", "client closed stdio connection");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                debug!(target: "complaint_rag::mcp", request = trimmed, "received");

                let response = match serde_json::from_str::<Value>(trimmed) {
                    Ok(request) => handle_jsonrpc_request(&server, request).await,
                    Err(err) => {
                        warn!(target: "complaint_rag::mcp", error = %err, "unparseable request");
                        Some(json!({
                            "jsonrpc": "2.0",
                            "id": Value::Null,
                            "error": { "code": -32700, "message": format!("Parse error: {err}") }
                        }))
                    }
                };

                // notifications get no reply
                let Some(response) = response else {
                    continue;
                };
                let payload = response.to_string();
                if let Err(err) = write_line(&mut stdout, &payload).await {
                    error!(target: "complaint_rag::mcp", error = %err, "failed to write response");
                    break;
                }
                debug!(target: "complaint_rag::mcp", response = %payload, "sent");
            }
            Err(err) => {
                error!(target: "complaint_rag::mcp", error = %err, "failed to read from stdin");
                break;
            }
        }
    }

    info!(target: "complaint_rag::mcp", "MCP stdio server terminated");
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, payload: &str) -> std::io::Result<()> {
    stdout.write_all(payload.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn handle_jsonrpc_request(server: &ComplaintsMcpServer, request: Value) -> Option<Value> {
    let id = request.get("id").cloned()?;
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");

    let outcome: Result<Value, McpError> = match method {
        "initialize" => {
            let info = server.get_info();
            Ok(json!({
                "protocolVersion": info.protocol_version,
                "capabilities": info.capabilities,
                "serverInfo": info.server_info,
                "instructions": info.instructions
            }))
        }
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": server.tool_router.list_all() })),
        "tools/call" => call_tool(server, request.get("params")).await,
        other => Err(McpError::new(
            rmcp::model::ErrorCode::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
            None,
        )),
    };

    Some(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(err) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": err.code, "message": err.message, "data": err.data }
        }),
    })
}

async fn call_tool(
    server: &ComplaintsMcpServer,
    params: Option<&Value>,
) -> Result<Value, McpError> {
    let params = params.ok_or_else(|| McpError::invalid_params("Invalid params", None))?;
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    if name != ASK_TOOL {
        return Err(McpError::invalid_params(format!("Unknown tool: {name}"), None));
    }

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let request = serde_json::from_value::<AskRequest>(arguments).map_err(|err| {
        McpError::invalid_params(
            "Invalid ask_complaints arguments",
            Some(json!({ "detail": err.to_string() })),
        )
    })?;

    let result = server.answer(request).await?;
    serde_json::to_value(result).map_err(|err| internal_error(err.to_string()))
}
