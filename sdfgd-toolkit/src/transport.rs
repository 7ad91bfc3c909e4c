//! Transports to the toolkit worker.

use crate::error::{ToolkitError, ToolkitResult};
use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};

type Pending = Arc<SyncMutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Trait for toolkit transport implementations.
#[async_trait]
pub trait ToolkitTransport: Send + Sync {
    /// Send a request and wait for response.
    async fn request(&self, request: &JsonRpcRequest) -> ToolkitResult<JsonRpcResponse>;

    /// Send a notification (no response expected).
    async fn notify(&self, notification: &JsonRpcNotification) -> ToolkitResult<()>;

    /// Close the transport.
    async fn close(&self) -> ToolkitResult<()>;

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// Stdio transport to a local worker process.
///
/// Requests are written to the worker's stdin one JSON document per line and
/// responses are correlated by numeric id. Everything the worker writes to
/// stderr is forwarded to the log at `warn`.
pub struct StdioTransport {
    child: Arc<Mutex<Option<Child>>>,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Pending,
    connected: Arc<AtomicBool>,
}

impl StdioTransport {
    /// Spawn a worker and connect via stdio.
    ///
    /// `env` is merged into the parent environment, overriding on conflict.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> ToolkitResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolkitError::Transport(format!("Failed to spawn {}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolkitError::Transport("No stdin".to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolkitError::Transport("No stdout".to_string()))?;

        let stderr = child.stderr.take();

        let pending: Pending = Arc::new(SyncMutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::reader_task(stdout, pending.clone(), connected.clone()));

        if let Some(stderr) = stderr {
            tokio::spawn(Self::stderr_forwarder(stderr, command.to_string()));
        }

        tracing::debug!(command, ?args, "Spawned toolkit worker");

        Ok(Self {
            child: Arc::new(Mutex::new(Some(child))),
            stdin: Arc::new(Mutex::new(stdin)),
            pending,
            connected,
        })
    }

    async fn reader_task(stdout: ChildStdout, pending: Pending, connected: Arc<AtomicBool>) {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response: JsonRpcResponse = match serde_json::from_str(trimmed) {
                        Ok(resp) => resp,
                        Err(e) => {
                            tracing::debug!(error = %e, "Ignoring non-protocol worker output");
                            continue;
                        }
                    };

                    let request_id = match &response.id {
                        RequestId::Number(id) if *id >= 0 => Some(*id as u64),
                        _ => None,
                    };

                    if let Some(id) = request_id {
                        let sender = pending.lock().remove(&id);
                        if let Some(tx) = sender {
                            let _ = tx.send(response);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed reading from toolkit worker");
                    break;
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with `ConnectionClosed`.
        pending.lock().clear();
        tracing::warn!("Toolkit worker closed its output");
    }

    /// Forward stderr to the log. Reading it also keeps the pipe from filling
    /// up and blocking the worker.
    async fn stderr_forwarder(stderr: ChildStderr, command: String) {
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim_end();
                    if !trimmed.is_empty() {
                        tracing::warn!(worker = %command, "{}", trimmed);
                    }
                }
                Err(_) => break,
            }
        }
    }

    async fn send_raw(&self, data: &str) -> ToolkitResult<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(data.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// A registered waiter, removed from the pending map when dropped.
struct PendingEntry {
    pending: Pending,
    id: u64,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

#[async_trait]
impl ToolkitTransport for StdioTransport {
    async fn request(&self, request: &JsonRpcRequest) -> ToolkitResult<JsonRpcResponse> {
        if !self.is_connected() {
            return Err(ToolkitError::ConnectionClosed);
        }

        let request_id = match &request.id {
            RequestId::Number(id) if *id >= 0 => *id as u64,
            _ => {
                return Err(ToolkitError::Transport(
                    "Only non-negative numeric request IDs are supported over stdio".to_string(),
                ));
            }
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);
        // Unregisters on every exit, including a caller dropping this future.
        let _entry = PendingEntry {
            pending: self.pending.clone(),
            id: request_id,
        };
        if !self.is_connected() {
            return Err(ToolkitError::ConnectionClosed);
        }

        let json = serde_json::to_string(request)?;
        self.send_raw(&json).await?;

        rx.await.map_err(|_| ToolkitError::ConnectionClosed)
    }

    async fn notify(&self, notification: &JsonRpcNotification) -> ToolkitResult<()> {
        let json = serde_json::to_string(notification)?;
        self.send_raw(&json).await
    }

    async fn close(&self) -> ToolkitResult<()> {
        self.connected.store(false, Ordering::SeqCst);

        let mut child = self.child.lock().await;
        if let Some(mut c) = child.take() {
            c.kill().await.ok();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Memory transport for testing.
///
/// Clones share state, so a test can keep one handle to inspect traffic
/// while the client owns another.
#[derive(Clone)]
pub struct MemoryTransport {
    responses: Arc<SyncMutex<VecDeque<JsonRpcResponse>>>,
    requests: Arc<SyncMutex<Vec<JsonRpcRequest>>>,
    notifications: Arc<SyncMutex<Vec<JsonRpcNotification>>>,
    connected: Arc<AtomicBool>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create a new memory transport.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(SyncMutex::new(VecDeque::new())),
            requests: Arc::new(SyncMutex::new(Vec::new())),
            notifications: Arc::new(SyncMutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queue a response. Responses are returned in order, ignoring ids.
    pub fn push_response(&self, response: JsonRpcResponse) {
        self.responses.lock().push_back(response);
    }

    /// Recorded requests.
    pub fn requests(&self) -> Vec<JsonRpcRequest> {
        self.requests.lock().clone()
    }

    /// Recorded notifications.
    pub fn notifications(&self) -> Vec<JsonRpcNotification> {
        self.notifications.lock().clone()
    }
}

#[async_trait]
impl ToolkitTransport for MemoryTransport {
    async fn request(&self, request: &JsonRpcRequest) -> ToolkitResult<JsonRpcResponse> {
        if !self.is_connected() {
            return Err(ToolkitError::ConnectionClosed);
        }
        self.requests.lock().push(request.clone());
        self.responses.lock().pop_front().ok_or(ToolkitError::NoResult)
    }

    async fn notify(&self, notification: &JsonRpcNotification) -> ToolkitResult<()> {
        self.notifications.lock().push(notification.clone());
        Ok(())
    }

    async fn close(&self) -> ToolkitResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
