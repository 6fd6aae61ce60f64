//! The seam between the pool and whatever actually runs a tool server.

use crate::client::{McpClient, ToolCallResult, ToolDescriptor};
use crate::config::ServerLaunch;
use crate::error::McpError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the object-safe server traits.
pub type McpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, McpError>> + Send + 'a>>;

/// A connected server that exposes tools.
pub trait ToolServer: Send + Sync {
    /// The catalog fetched at connect time.
    fn tools(&self) -> &[ToolDescriptor];

    fn call_tool<'a>(&'a self, name: &'a str, arguments: Value) -> McpFuture<'a, ToolCallResult>;

    /// Release the connection. Called exactly once per server.
    fn shutdown(self: Box<Self>) -> McpFuture<'static, ()>;
}

/// Starts servers for the pool.
pub trait ServerLauncher: Send + Sync {
    fn launch<'a>(&'a self, launch: &'a ServerLaunch) -> McpFuture<'a, Box<dyn ToolServer>>;
}

/// Launches real child processes over stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioLauncher;

impl ServerLauncher for StdioLauncher {
    fn launch<'a>(&'a self, launch: &'a ServerLaunch) -> McpFuture<'a, Box<dyn ToolServer>> {
        Box::pin(async move {
            McpClient::connect(launch)
                .await
                .map(|client| Box::new(client) as Box<dyn ToolServer>)
        })
    }
}

impl ToolServer for McpClient {
    fn tools(&self) -> &[ToolDescriptor] {
        McpClient::tools(self)
    }

    fn call_tool<'a>(&'a self, name: &'a str, arguments: Value) -> McpFuture<'a, ToolCallResult> {
        Box::pin(McpClient::call_tool(self, name, arguments))
    }

    fn shutdown(self: Box<Self>) -> McpFuture<'static, ()> {
        Box::pin(McpClient::shutdown(*self))
    }
}
