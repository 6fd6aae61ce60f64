//! Error types for MCP operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from talking to a single MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("MCP server closed the connection")]
    ServerClosed,

    #[error("JSON-RPC error from {server} (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("'{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the server pool: startup validation, connection and routing.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("No server scripts were given")]
    NoServers,

    #[error("Server script must be a .js or .py file: {}", .path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error("Server pool is already connected")]
    AlreadyConnected,

    #[error("Failed to connect to server {} ({}): {source}", .index + 1, .path.display())]
    Connect {
        index: usize,
        path: PathBuf,
        source: McpError,
    },

    #[error("No connected server at index {index}")]
    ServerNotConnected { index: usize },

    #[error("Tool '{tool}' failed on server {}: {source}", .index + 1)]
    Call {
        index: usize,
        tool: String,
        source: McpError,
    },

    #[error("Failed to close server {}: {source}", .index + 1)]
    Close { index: usize, source: McpError },
}
