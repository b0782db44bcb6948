//! In-process MCP server support.
//!
//! An SDK MCP server runs its tools inside this process rather than as an
//! external subprocess/SSE/HTTP server. The CLI addresses it through the same
//! control-request channel used for hooks and permissions: it sends an
//! `mcp_message` control request wrapping a JSON-RPC 2.0 envelope
//! (`initialize`, `tools/list`, `tools/call`, `notifications/initialized`),
//! and expects a `control_response` carrying the JSON-RPC reply.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::Result;

pub use crate::types::mcp::{
    McpHttpServerConfig, McpServerConfig, McpServers, McpSseServerConfig, McpStdioServerConfig,
    SdkMcpServerConfig,
};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// A single piece of `tools/call` output content.
#[derive(Debug, Clone)]
pub enum McpToolContent {
    /// Plain text content.
    Text {
        /// The text.
        text: String,
    },
    /// Base64-encoded image content.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// Image MIME type.
        mime_type: String,
    },
    /// Arbitrary structured content.
    Json {
        /// The value.
        value: Value,
    },
}

/// Metadata describing a tool an [`SdkMcpServer`] exposes via `tools/list`.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// JSON Schema for the tool's input.
    pub input_schema: Option<Value>,
}

/// The result of a `tools/call` invocation.
#[derive(Debug, Clone, Default)]
pub struct McpToolCallResult {
    /// Output content blocks.
    pub content: Vec<McpToolContent>,
    /// Whether the tool call itself failed.
    pub is_error: bool,
}

impl McpToolCallResult {
    /// A successful single-text-block result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A failed single-text-block result.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }
}

/// An in-process MCP server. Implementors provide the tool catalog and
/// execution; this module handles the JSON-RPC envelope around them.
#[async_trait]
pub trait SdkMcpServer: Send + Sync {
    /// Server name, reported in the `initialize` response.
    fn name(&self) -> &str;

    /// Server version, reported in the `initialize` response.
    fn version(&self) -> Option<&str> {
        None
    }

    /// List the tools this server exposes.
    ///
    /// # Errors
    /// Returns an error if the tool catalog cannot be produced.
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>>;

    /// Invoke a tool by name.
    ///
    /// # Errors
    /// Returns an error if the tool is unknown or its execution fails in a
    /// way that should surface as a JSON-RPC error rather than a tool-level
    /// error result.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>)
    -> Result<McpToolCallResult>;
}

/// Registry of in-process MCP servers, keyed by the name the CLI addresses
/// them with.
pub type McpServerRegistry = HashMap<String, Arc<dyn SdkMcpServer>>;

/// Dispatch a CLI `mcp_message` control request body to the named server and
/// return the JSON-RPC response to send back as a `control_response`.
pub async fn handle_mcp_message(servers: &McpServerRegistry, request: &Value) -> Value {
    let Some(server_name) = request.get("server_name").and_then(Value::as_str) else {
        return jsonrpc_error(Value::Null, -32600, "mcp_message missing server_name");
    };
    let Some(message) = request.get("message").and_then(Value::as_object) else {
        return jsonrpc_error(Value::Null, -32600, "mcp_message missing message object");
    };
    let id = message.get("id").cloned().unwrap_or(Value::Null);

    let Some(server) = servers.get(server_name) else {
        return jsonrpc_error(id, -32601, format!("server '{server_name}' not found"));
    };

    let Some(method) = message.get("method").and_then(Value::as_str) else {
        return jsonrpc_error(id, -32600, "mcp message missing method");
    };

    match method {
        "initialize" => build_initialize_response(id, server.as_ref()),
        "tools/list" => list_tools_response(id, server.as_ref()).await,
        "tools/call" => call_tool_response(id, message, server.as_ref()).await,
        "notifications/initialized" => json!({"jsonrpc": "2.0", "result": {}}),
        other => jsonrpc_error(id, -32601, format!("method '{other}' not found")),
    }
}

fn build_initialize_response(id: Value, server: &dyn SdkMcpServer) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": server.name(),
                "version": server.version().unwrap_or("1.0.0"),
            },
        },
    })
}

async fn list_tools_response(id: Value, server: &dyn SdkMcpServer) -> Value {
    match server.list_tools().await {
        Ok(tools) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"tools": tools.into_iter().map(tool_info_to_json).collect::<Vec<_>>()},
        }),
        Err(e) => jsonrpc_error(id, -32603, e.to_string()),
    }
}

async fn call_tool_response(id: Value, message: &Map<String, Value>, server: &dyn SdkMcpServer) -> Value {
    let params = message.get("params").and_then(Value::as_object);
    let Some(tool_name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
        return jsonrpc_error(id, -32602, "tools/call missing name parameter");
    };
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    match server.call_tool(tool_name, arguments).await {
        Ok(result) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": tool_call_result_to_json(result),
        }),
        Err(e) => jsonrpc_error(id, -32603, e.to_string()),
    }
}

fn tool_info_to_json(tool: McpToolInfo) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": tool.input_schema.unwrap_or_else(|| Value::Object(Map::new())),
    })
}

fn tool_call_result_to_json(result: McpToolCallResult) -> Value {
    let content: Vec<Value> = result
        .content
        .into_iter()
        .map(|item| match item {
            McpToolContent::Text { text } => json!({"type": "text", "text": text}),
            McpToolContent::Image { data, mime_type } => {
                json!({"type": "image", "data": data, "mimeType": mime_type})
            }
            McpToolContent::Json { value } => json!({"type": "json", "value": value}),
        })
        .collect();
    json!({"content": content, "isError": result.is_error})
}

fn jsonrpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message.into()},
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoServer;

    #[async_trait]
    impl SdkMcpServer for EchoServer {
        fn name(&self) -> &str {
            "echo"
        }

        async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
            Ok(vec![McpToolInfo {
                name: "echo".to_string(),
                description: Some("echoes its input".to_string()),
                input_schema: None,
            }])
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Map<String, Value>,
        ) -> Result<McpToolCallResult> {
            if name != "echo" {
                return Ok(McpToolCallResult::error(format!("unknown tool '{name}'")));
            }
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(McpToolCallResult::text(text))
        }
    }

    fn registry() -> McpServerRegistry {
        let mut servers: McpServerRegistry = HashMap::new();
        servers.insert("echo".to_string(), Arc::new(EchoServer));
        servers
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let request = json!({
            "server_name": "echo",
            "message": {"jsonrpc": "2.0", "id": 1, "method": "initialize"},
        });
        let response = handle_mcp_message(&registry(), &request).await;
        assert_eq!(response["result"]["serverInfo"]["name"], "echo");
    }

    #[tokio::test]
    async fn tools_list_returns_catalog() {
        let request = json!({
            "server_name": "echo",
            "message": {"jsonrpc": "2.0", "id": 2, "method": "tools/list"},
        });
        let response = handle_mcp_message(&registry(), &request).await;
        assert_eq!(response["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn tools_call_invokes_the_tool() {
        let request = json!({
            "server_name": "echo",
            "message": {
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "echo", "arguments": {"text": "hi"}},
            },
        });
        let response = handle_mcp_message(&registry(), &request).await;
        assert_eq!(response["result"]["content"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn unknown_method_is_jsonrpc_error() {
        let request = json!({
            "server_name": "echo",
            "message": {"jsonrpc": "2.0", "id": 4, "method": "bogus"},
        });
        let response = handle_mcp_message(&registry(), &request).await;
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn unknown_server_is_jsonrpc_error() {
        let request = json!({
            "server_name": "missing",
            "message": {"jsonrpc": "2.0", "id": 5, "method": "initialize"},
        });
        let response = handle_mcp_message(&registry(), &request).await;
        assert_eq!(response["error"]["code"], -32601);
    }
}
