//! JSON-RPC 2.0 frames and MCP payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const JSONRPC_VERSION: &str = "2.0";

/// Outgoing request frame.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    /// Creates a request with correlation id `id`.
    #[must_use]
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Outgoing notification frame; no response is expected.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    /// Creates a notification.
    #[must_use]
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Incoming response frame.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Correlation id; JSON-RPC allows numbers, strings, or null.
    #[serde(default)]
    pub id: Value,
    /// Success payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Returns whether the response answers request `id`.
    #[must_use]
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_u64() == Some(id)
    }

    /// Splits the response into its success or error payload.
    ///
    /// # Errors
    ///
    /// Returns the peer's [`JsonRpcError`] when the response carries one.
    pub fn into_outcome(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// `initialize` request parameters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol revision.
    pub protocol_version: &'static str,
    /// Client capabilities; hexpilot announces none.
    pub capabilities: Value,
    /// Client identification.
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Creates handshake parameters for this crate.
    #[must_use]
    pub fn for_client() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: Value::Object(serde_json::Map::new()),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

/// Client identification sent during the handshake.
#[derive(Debug, Serialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: &'static str,
    /// Client version.
    pub version: &'static str,
}

/// `tools/list` result page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools on this page.
    #[serde(default)]
    pub tools: Vec<ListedTool>,
    /// Cursor of the next page, if any.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Tool entry in a `tools/list` page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedTool {
    /// Tool name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional JSON schema of the arguments.
    #[serde(default)]
    pub input_schema: Option<Value>,
}

/// `tools/call` request parameters.
#[derive(Debug, Serialize)]
pub struct CallToolParams<'a> {
    /// Tool name.
    pub name: &'a str,
    /// Tool arguments.
    pub arguments: Value,
}

/// `tools/call` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content blocks, kept raw so unknown block types survive.
    #[serde(default)]
    pub content: Vec<Value>,
    /// Optional structured output.
    #[serde(default)]
    pub structured_content: Option<Value>,
    /// Whether the tool reported a failure.
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Joins text blocks with newlines and serializes any other block as JSON.
    #[must_use]
    pub fn joined_text(&self) -> Option<String> {
        if self.content.is_empty() {
            return None;
        }

        let parts: Vec<String> = self
            .content
            .iter()
            .map(|block| {
                let is_text = block.get("type").and_then(Value::as_str) == Some("text");
                match block.get("text").and_then(Value::as_str) {
                    Some(text) if is_text => text.to_owned(),
                    _ => block.to_string(),
                }
            })
            .collect();
        Some(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_without_absent_params() {
        let frame = serde_json::to_value(JsonRpcRequest::new(1, "tools/list", None))
            .expect("request serializes");
        assert_eq!(frame, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
    }

    #[test]
    fn initialize_params_use_camel_case() {
        let params =
            serde_json::to_value(InitializeParams::for_client()).expect("params serialize");
        assert_eq!(params["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(params["clientInfo"]["name"], json!("hexpilot"));
        assert_eq!(params["capabilities"], json!({}));
    }

    #[test]
    fn error_response_yields_error_outcome() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": {"code": -32602, "message": "Unknown tool: nope"}
        }))
        .expect("response parses");

        assert!(response.answers(7));
        let error = response.into_outcome().expect_err("error outcome");
        assert_eq!(error.code, -32602);
    }

    #[test]
    fn string_ids_never_answer_numeric_requests() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": "7", "result": {}}))
                .expect("response parses");
        assert!(!response.answers(7));
    }

    #[test]
    fn call_result_mixes_text_and_other_blocks() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "22/tcp open ssh"},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"}
            ],
            "isError": false
        }))
        .expect("result parses");

        let text = result.joined_text().expect("content present");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("22/tcp open ssh"));
        let image: Value =
            serde_json::from_str(lines.next().expect("second block")).expect("json block");
        assert_eq!(image["mimeType"], json!("image/png"));
    }
}
