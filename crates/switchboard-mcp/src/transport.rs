//! Stdio transport for MCP server communication.
//!
//! Spawns a child process and manages async communication over stdin/stdout
//! using newline-delimited JSON-RPC messages.

use crate::error::McpError;
use crate::jsonrpc::{
    Incoming, JsonRpcErrorReply, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse,
};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Grace period between closing stdin and killing the child.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Requests waiting for a response, keyed by id. `None` once the server's
/// stdout has closed, so late requests fail instead of waiting forever.
type PendingMap = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>>;

/// Async stdio transport for communicating with an MCP server process.
pub struct StdioTransport {
    next_id: AtomicU64,
    write_tx: mpsc::Sender<String>,
    pending: PendingMap,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
    child: Mutex<Child>,
    timeout_ms: Option<u64>,
}

impl StdioTransport {
    /// Spawn a child process and start background reader/writer tasks.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout_ms: Option<u64>,
    ) -> Result<Self, McpError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::SpawnFailed {
                command: command.to_string(),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("child stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("child stdout was not piped".to_string()))?;

        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));

        // Writer task: drains channel and writes to child stdin
        let (write_tx, mut write_rx) = mpsc::channel::<String>(64);
        let writer_handle = tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = write_rx.recv().await {
                let line = format!("{msg}\n");
                if stdin.write_all(line.as_bytes()).await.is_err() || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        // Reader task: holds only a weak sender so dropping `write_tx` still
        // closes the child's stdin.
        let pending_for_reader = Arc::clone(&pending);
        let reply_tx = write_tx.downgrade();
        let reader_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                let message: JsonRpcMessage = match serde_json::from_str(&line) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("Failed to parse MCP message: {e}: {line}");
                        continue;
                    }
                };
                match message.classify() {
                    Incoming::Response(resp) => {
                        let mut pending = pending_for_reader.lock().await;
                        if let Some(tx) = pending.as_mut().and_then(|p| p.remove(&resp.id)) {
                            let _ = tx.send(resp);
                        }
                    }
                    Incoming::Request { id, method } => {
                        tracing::debug!("Rejecting server request '{method}'");
                        let reply = JsonRpcErrorReply::method_not_found(id, &method);
                        if let (Some(tx), Ok(text)) =
                            (reply_tx.upgrade(), serde_json::to_string(&reply))
                        {
                            let _ = tx.send(text).await;
                        }
                    }
                    Incoming::Notification { method } => {
                        tracing::trace!("Ignoring server notification '{method}'");
                    }
                    Incoming::Unroutable => {
                        tracing::warn!("Dropping unroutable MCP message: {line}");
                    }
                }
            }
            // Dropping the senders fails every outstanding request.
            pending_for_reader.lock().await.take();
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            write_tx,
            pending,
            reader_handle,
            writer_handle,
            child: Mutex::new(child),
            timeout_ms,
        })
    }

    /// Send a JSON-RPC request and wait for the response.
    ///
    /// Without a configured timeout this waits as long as the server is alive.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let serialized = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            let pending = pending.as_mut().ok_or(McpError::ServerClosed)?;
            pending.insert(id, tx);
        }

        if self.write_tx.send(serialized).await.is_err() {
            self.forget(id).await;
            return Err(McpError::ServerClosed);
        }

        let Some(timeout_ms) = self.timeout_ms else {
            return rx.await.map_err(|_| McpError::ServerClosed);
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(McpError::ServerClosed),
            Err(_) => {
                self.forget(id).await;
                Err(McpError::Timeout {
                    method: method.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    async fn forget(&self, id: u64) {
        if let Some(pending) = self.pending.lock().await.as_mut() {
            pending.remove(&id);
        }
    }

    /// Send a JSON-RPC notification (fire-and-forget, no response expected).
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let serialized = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.write_tx
            .send(serialized)
            .await
            .map_err(|_| McpError::ServerClosed)
    }

    /// Shut down the transport: close stdin, wait briefly, then kill.
    pub async fn shutdown(self) -> Result<(), McpError> {
        let Self {
            write_tx,
            reader_handle,
            writer_handle,
            child,
            ..
        } = self;

        drop(write_tx);
        let mut child = child.into_inner();

        let result = match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(status) => status.map(|_| ()).map_err(McpError::Io),
            Err(_) => {
                tracing::debug!("MCP server did not exit after stdin closed; killing it");
                child.kill().await.map_err(McpError::Io)
            }
        };

        reader_handle.abort();
        writer_handle.abort();
        result
    }
}
