//! MCP (Model Context Protocol) client side of Switchboard.
//!
//! Each server script is spawned as a child process speaking newline-delimited
//! JSON-RPC 2.0 over stdio. The [`ServerPool`] launches all of them at once,
//! collects their tool catalogs, routes tool calls by server index, and closes
//! every connection it opened.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod pool;
pub mod server;
mod transport;

pub use client::{McpClient, ToolCallResult, ToolContent, ToolDescriptor};
pub use config::{LaunchSettings, ServerKind, ServerLaunch};
pub use error::{McpError, PoolError};
pub use pool::{CloseSummary, ServerCatalog, ServerPool};
pub use server::{McpFuture, ServerLauncher, StdioLauncher, ToolServer};
