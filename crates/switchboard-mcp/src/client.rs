//! One live MCP session over stdio.
//!
//! A session performs the `initialize` handshake, pages through `tools/list`,
//! and then serves `tools/call` requests until it is shut down.

use crate::config::ServerLaunch;
use crate::error::McpError;
use crate::jsonrpc::JsonRpcResponse;
use crate::transport::StdioTransport;
use serde::Deserialize;
use serde_json::Value;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Upper bound on `tools/list` pages, in case a server keeps handing out cursors.
const MAX_LIST_PAGES: usize = 64;

/// A tool as advertised by a server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Outcome of a `tools/call`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }
}

/// One item of tool output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Audio, resources and anything newer than this client.
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct ToolPage {
    #[serde(default)]
    tools: Vec<WireTool>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct WireTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "empty_object_schema", rename = "inputSchema")]
    input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl From<WireTool> for ToolDescriptor {
    fn from(tool: WireTool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

/// A connected MCP server.
pub struct McpClient {
    label: String,
    transport: StdioTransport,
    tools: Vec<ToolDescriptor>,
}

impl McpClient {
    /// Spawn the server, complete the handshake, and fetch its tool catalog.
    ///
    /// On failure the child process is shut down before returning.
    pub async fn connect(launch: &ServerLaunch) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(
            &launch.command,
            &launch.args,
            &launch.env,
            launch.timeout_ms,
        )?;
        let label = launch.label();

        match handshake(&transport, &label, launch.index).await {
            Ok(tools) => {
                tracing::debug!("{label} advertised {} tools", tools.len());
                Ok(Self {
                    label,
                    transport,
                    tools,
                })
            }
            Err(e) => {
                if let Err(close_err) = transport.shutdown().await {
                    tracing::debug!("Closing {label} after failed handshake: {close_err}");
                }
                Err(e)
            }
        }
    }

    /// Invoke `name` with `arguments` and wait for the result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = expect_result(
            &self.label,
            self.transport.send_request("tools/call", Some(params)).await?,
        )?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Bad tools/call result: {e}")))
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Close stdin and wait for the process to exit.
    pub async fn shutdown(self) -> Result<(), McpError> {
        self.transport.shutdown().await
    }
}

async fn handshake(
    transport: &StdioTransport,
    label: &str,
    index: usize,
) -> Result<Vec<ToolDescriptor>, McpError> {
    let init = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": format!("switchboard-{index}"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    });
    expect_result(label, transport.send_request("initialize", Some(init)).await?)?;
    transport
        .send_notification("notifications/initialized", None)
        .await?;

    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;
    for _ in 0..MAX_LIST_PAGES {
        let params = cursor.take().map(|c| serde_json::json!({ "cursor": c }));
        let result = expect_result(label, transport.send_request("tools/list", params).await?)?;
        let page: ToolPage = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Bad tools/list result: {e}")))?;
        tools.extend(page.tools.into_iter().map(ToolDescriptor::from));
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(tools),
        }
    }
    tracing::warn!("{label} returned more than {MAX_LIST_PAGES} tool pages; ignoring the rest");
    Ok(tools)
}

/// Turn a response into its `result`, surfacing JSON-RPC errors.
fn expect_result(label: &str, resp: JsonRpcResponse) -> Result<Value, McpError> {
    if let Some(err) = resp.error {
        return Err(McpError::JsonRpc {
            server: label.to_string(),
            code: err.code,
            message: err.message,
        });
    }
    resp.result
        .ok_or_else(|| McpError::Protocol("response has neither result nor error".to_string()))
}
