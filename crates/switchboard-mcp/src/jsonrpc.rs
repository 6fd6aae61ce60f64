//! JSON-RPC 2.0 framing for MCP communication.

use serde::{Deserialize, Serialize};

/// JSON-RPC "method not found" error code.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// A JSON-RPC 2.0 request sent by the client.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// An error reply the client sends back for server-initiated requests it
/// does not support.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorReply {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub error: JsonRpcError,
}

impl JsonRpcErrorReply {
    pub fn method_not_found(id: serde_json::Value, method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
                data: None,
            },
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A response to one of the client's requests.
#[derive(Debug, Clone)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// Any line a server may write: a response, a request, or a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// What an incoming line turned out to be.
#[derive(Debug, Clone)]
pub enum Incoming {
    Response(JsonRpcResponse),
    Request {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
    },
    /// Has neither a method nor a numeric id the client could have issued.
    Unroutable,
}

impl JsonRpcMessage {
    pub fn classify(self) -> Incoming {
        match (self.method, self.id) {
            (Some(method), Some(id)) => Incoming::Request { id, method },
            (Some(method), None) => Incoming::Notification { method },
            (None, Some(id)) => match id.as_u64() {
                Some(id) => Incoming::Response(JsonRpcResponse {
                    id,
                    result: self.result,
                    error: self.error,
                }),
                None => Incoming::Unroutable,
            },
            (None, None) => Incoming::Unroutable,
        }
    }
}
