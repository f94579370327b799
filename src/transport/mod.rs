//! Unix-socket JSON-RPC 2.0 transport to the Signal daemon.
//!
//! One long-lived connection, one writer (under a mutex) and one background
//! reader task. The reader demultiplexes responses to pending request
//! waiters by numeric id and enqueues `receive` notifications for the intake
//! loop to drain.

use crate::errors::BridgeError;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, BridgeError>>>>>;

/// A single parsed inbound `receive` notification's raw `params`.
pub type RawEnvelope = Value;

struct Inner {
    writer: Mutex<Option<OwnedWriteHalf>>,
    pending: PendingMap,
    notifications: Mutex<VecDeque<RawEnvelope>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    reader_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// JSON-RPC transport over a Unix domain socket speaking newline-delimited JSON.
#[derive(Clone)]
pub struct RpcTransport {
    socket_path: PathBuf,
    account: String,
    inner: Arc<Inner>,
}

impl RpcTransport {
    pub fn new(socket_path: PathBuf, account: String) -> Self {
        Self {
            socket_path,
            account,
            inner: Arc::new(Inner {
                writer: Mutex::new(None),
                pending: Arc::new(Mutex::new(HashMap::new())),
                notifications: Mutex::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
                connected: AtomicBool::new(false),
                reader_handle: Mutex::new(None),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Attempt repeated connections to the socket until `timeout` elapses.
    pub async fn connect(&self, timeout: Duration) -> Result<(), BridgeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut backoff = Duration::from_millis(250);
        loop {
            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => {
                    let (read_half, write_half) = stream.into_split();
                    *self.inner.writer.lock().await = Some(write_half);
                    self.inner.connected.store(true, Ordering::SeqCst);
                    self.spawn_reader(read_half).await;
                    info!(socket = %self.socket_path.display(), "connected to Signal transport");
                    return Ok(());
                }
                Err(e) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(BridgeError::TransportUnavailable(format!(
                            "could not connect to {}: {e}",
                            self.socket_path.display()
                        )));
                    }
                    debug!(error = %e, "transport connect attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
            }
        }
    }

    async fn spawn_reader(&self, read_half: tokio::net::unix::OwnedReadHalf) {
        let pending = self.inner.pending.clone();
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        Self::handle_line(&inner, &pending, &line).await;
                    }
                    Ok(None) => {
                        debug!("transport reader hit EOF");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "transport reader error");
                        break;
                    }
                }
            }
            inner.connected.store(false, Ordering::SeqCst);
            Self::release_all_waiters(&pending).await;
        });

        *self.inner.reader_handle.lock().await = Some(handle);
    }

    async fn handle_line(inner: &Arc<Inner>, pending: &PendingMap, line: &str) {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "discarding unparseable transport line");
                return;
            }
        };

        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            let waiter = pending.lock().await.remove(&id);
            if let Some(tx) = waiter {
                let result = if let Some(err) = value.get("error") {
                    Err(BridgeError::RpcError(err.to_string()))
                } else {
                    Ok(value.get("result").cloned().unwrap_or(Value::Null))
                };
                let _ = tx.send(result);
            }
            return;
        }

        if value.get("method").and_then(Value::as_str) == Some("receive") {
            let params = value.get("params").cloned().unwrap_or(Value::Null);
            inner.notifications.lock().await.push_back(params);
            return;
        }

        debug!(line = %line, "discarding unrecognized transport message");
    }

    async fn release_all_waiters(pending: &PendingMap) {
        let mut guard = pending.lock().await;
        for (_, tx) in guard.drain() {
            let _ = tx.send(Err(BridgeError::TransportClosed));
        }
    }

    /// Issue a JSON-RPC request and wait up to `timeout` for its response.
    pub async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::TransportClosed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id, tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line = serde_json::to_string(&payload)
            .map_err(|e| BridgeError::RpcError(format!("failed to encode request: {e}")))?;
        line.push('\n');

        {
            let mut writer_guard = self.inner.writer.lock().await;
            let writer = writer_guard
                .as_mut()
                .ok_or(BridgeError::TransportClosed)?;
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                self.inner.pending.lock().await.remove(&id);
                return Err(BridgeError::TransportUnavailable(e.to_string()));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::TransportClosed),
            Err(_) => {
                self.inner.pending.lock().await.remove(&id);
                Err(BridgeError::RpcTimeout(timeout))
            }
        }
    }

    /// Return every notification queued since the last drain, without blocking.
    pub async fn drain_notifications(&self) -> Vec<RawEnvelope> {
        let mut guard = self.inner.notifications.lock().await;
        guard.drain(..).collect()
    }

    pub async fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        *self.inner.writer.lock().await = None;
        Self::release_all_waiters(&self.inner.pending).await;
        if let Some(handle) = self.inner.reader_handle.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn reconnect(&self, timeout: Duration) -> Result<(), BridgeError> {
        self.disconnect().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.connect(timeout).await
    }

    pub async fn send_message(
        &self,
        recipient: &str,
        message: &str,
        attachments: &[String],
    ) -> Result<Value, BridgeError> {
        self.request(
            "send",
            json!({
                "account": self.account,
                "recipient": [recipient],
                "message": message,
                "attachments": attachments,
            }),
            Duration::from_secs(20),
        )
        .await
    }

    pub async fn send_reaction(
        &self,
        recipient: &str,
        emoji: &str,
        target_timestamp: i64,
    ) -> Result<Value, BridgeError> {
        self.request(
            "sendReaction",
            json!({
                "account": self.account,
                "recipient": [recipient],
                "emoji": emoji,
                "targetAuthor": recipient,
                "targetTimestamp": target_timestamp,
            }),
            Duration::from_secs(10),
        )
        .await
    }

    pub async fn send_typing_indicator(&self, recipient: &str) -> Result<(), BridgeError> {
        self.request(
            "sendTyping",
            json!({ "account": self.account, "recipient": [recipient] }),
            Duration::from_secs(5),
        )
        .await
        .map(|_| ())
    }

    pub async fn list_contacts(&self) -> Result<Value, BridgeError> {
        self.request(
            "listContacts",
            json!({ "account": self.account }),
            Duration::from_secs(10),
        )
        .await
    }

    /// Read raw attachment bytes from the daemon's local attachment directory.
    /// No RPC round-trip: the daemon already wrote the bytes to disk when the
    /// notification arrived.
    pub async fn download_attachment(&self, attachments_dir: &std::path::Path, id: &str) -> Result<Vec<u8>> {
        let path = attachments_dir.join(id);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read attachment {}", path.display()))
    }
}
