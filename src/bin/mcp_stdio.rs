use complaint_rag::run_mcp_stdio;

/// MCP server over stdio for clients that spawn a process and exchange
/// newline-delimited JSON-RPC on stdin/stdout.
///
/// ```json
/// {
///   "mcpServers": {
///     "complaints": {
///       "command": "/path/to/mcp-stdio",
///       "env": { "AWS_BEARER_TOKEN_BEDROCK": "..." }
///     }
///   }
/// }
/// ```
///
/// Environment:
/// - `COMPLAINTS_LOG`: log filter (written to stderr)
/// - `COMPLAINTS_DATA_DIR`: data directory holding `config.json` and `index/`
#[tokio::main]
async fn main() {
    if let Err(err) = run_mcp_stdio().await {
        eprintln!("[complaint-rag::mcp-stdio] runtime failed: {err:?}");
        std::process::exit(1);
    }
}
