//! The Server Pool: every tool server of one session, addressed by index.

use crate::client::{ToolCallResult, ToolDescriptor};
use crate::config::{LaunchSettings, ServerLaunch};
use crate::error::PoolError;
use crate::server::{ServerLauncher, StdioLauncher, ToolServer};
use futures_util::future::join_all;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// The tools one server advertised, tagged with its index.
#[derive(Debug, Clone)]
pub struct ServerCatalog {
    pub index: usize,
    pub label: String,
    pub tools: Vec<ToolDescriptor>,
}

/// What `close_all` managed to do.
#[derive(Debug, Default)]
pub struct CloseSummary {
    pub closed: usize,
    pub failed: Vec<PoolError>,
}

impl CloseSummary {
    pub fn attempted(&self) -> usize {
        self.closed + self.failed.len()
    }
}

struct ServerConnection {
    index: usize,
    label: String,
    server: Box<dyn ToolServer>,
}

/// Owns all server connections for the lifetime of a session.
pub struct ServerPool {
    launcher: Arc<dyn ServerLauncher>,
    settings: LaunchSettings,
    connections: Vec<ServerConnection>,
}

impl ServerPool {
    pub fn new(launcher: Arc<dyn ServerLauncher>, settings: LaunchSettings) -> Self {
        Self {
            launcher,
            settings,
            connections: Vec::new(),
        }
    }

    /// A pool that spawns real child processes.
    pub fn stdio(settings: LaunchSettings) -> Self {
        Self::new(Arc::new(StdioLauncher), settings)
    }

    /// Start one server per path, all at once.
    ///
    /// Every path is validated before anything is launched. If any launch
    /// fails, the servers that did start stay in the pool so that
    /// [`close_all`](Self::close_all) still shuts them down, and the error for
    /// the lowest failing index is returned.
    pub async fn connect<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<Vec<ServerCatalog>, PoolError> {
        if paths.is_empty() {
            return Err(PoolError::NoServers);
        }
        if !self.connections.is_empty() {
            return Err(PoolError::AlreadyConnected);
        }

        let launches = paths
            .iter()
            .enumerate()
            .map(|(index, path)| self.settings.launch_for(index, path.as_ref()))
            .collect::<Result<Vec<ServerLaunch>, _>>()?;

        for launch in &launches {
            tracing::info!(
                "Connecting to server {}: {}",
                launch.index + 1,
                launch.path.display()
            );
        }

        let launcher = Arc::clone(&self.launcher);
        let outcomes = join_all(launches.iter().map(|launch| launcher.launch(launch))).await;

        let mut catalogs = Vec::with_capacity(launches.len());
        let mut first_error = None;
        for (launch, outcome) in launches.iter().zip(outcomes) {
            match outcome {
                Ok(server) => {
                    let tools = server.tools().to_vec();
                    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                    tracing::info!("Server {} tools: {}", launch.index + 1, names.join(", "));
                    catalogs.push(ServerCatalog {
                        index: launch.index,
                        label: launch.label(),
                        tools,
                    });
                    self.connections.push(ServerConnection {
                        index: launch.index,
                        label: launch.label(),
                        server,
                    });
                }
                Err(source) => {
                    tracing::error!("Failed to connect to {}: {source}", launch.label());
                    if first_error.is_none() {
                        first_error = Some(PoolError::Connect {
                            index: launch.index,
                            path: launch.path.clone(),
                            source,
                        });
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(catalogs),
        }
    }

    /// Call `tool` on the server at `index`.
    pub async fn invoke(
        &self,
        index: usize,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, PoolError> {
        let conn = self
            .connections
            .iter()
            .find(|c| c.index == index)
            .ok_or(PoolError::ServerNotConnected { index })?;
        tracing::debug!("Calling '{tool}' on {}", conn.label);
        conn.server
            .call_tool(tool, arguments)
            .await
            .map_err(|source| PoolError::Call {
                index,
                tool: tool.to_string(),
                source,
            })
    }

    /// Shut down every held connection. Failures are logged and collected;
    /// the remaining connections are still closed.
    pub async fn close_all(&mut self) -> CloseSummary {
        let mut summary = CloseSummary::default();
        for conn in self.connections.drain(..) {
            match conn.server.shutdown().await {
                Ok(()) => {
                    tracing::debug!("Closed {}", conn.label);
                    summary.closed += 1;
                }
                Err(source) => {
                    tracing::warn!("Error closing {}: {source}", conn.label);
                    summary.failed.push(PoolError::Close {
                        index: conn.index,
                        source,
                    });
                }
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
