//! RPC correlation engine: call/return semantics over the message bus.
//!
//! One dedicated reader task receives every inbound frame and dispatches it
//! by correlation identifier to a waiter table, so any number of calls can
//! be in flight concurrently and resolve independently, out of order.
//! Frames with an unknown or absent identifier (unsolicited events, late
//! responses to abandoned calls) are discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use matterlink_api::{commands, RpcClient, RpcClientConfig};
//! use url::Url;
//!
//! let url = Url::parse("ws://localhost:5580/ws")?;
//! let client = RpcClient::connect(&url, RpcClientConfig::default()).await?;
//!
//! let nodes = client.call(commands::GET_NODES, serde_json::json!({})).await?;
//! client.close().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::envelope::{RpcRequest, RpcResponse};
use crate::error::Error;
use crate::transport::{SessionState, WsTransport};

// ── RpcClientConfig ──────────────────────────────────────────────────

/// Timeout tuning for an [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Budget for establishing the WebSocket connection. Default: 15s.
    pub connect_timeout: Duration,

    /// Default per-call response budget. Default: 20s.
    /// Commissioning-class calls pass a larger budget explicitly via
    /// [`RpcClient::call_with_timeout`].
    pub call_timeout: Duration,

    /// Per-attempt receive window used by the reader task. Default: 1s.
    pub receive_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            call_timeout: Duration::from_secs(20),
            receive_timeout: Duration::from_secs(1),
        }
    }
}

// ── RpcClient ────────────────────────────────────────────────────────

type WaiterTable = DashMap<String, oneshot::Sender<RpcResponse>>;

/// Correlated RPC client over one [`WsTransport`] session.
///
/// Cheaply cloneable; all clones share the session and waiter table.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<RpcInner>,
}

struct RpcInner {
    transport: Arc<WsTransport>,
    /// Next correlation identifier. Starts at 1, never reused, never wraps
    /// within a process lifetime.
    next_id: AtomicU64,
    waiters: Arc<WaiterTable>,
    cancel: CancellationToken,
    call_timeout: Duration,
}

impl Drop for RpcInner {
    /// A client dropped without [`RpcClient::close`] must still stop the
    /// reader task, or it would hold the socket open forever.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("state", &self.state())
            .field("pending", &self.inner.waiters.len())
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Connect to the bridge server and spawn the reader task.
    pub async fn connect(url: &Url, config: RpcClientConfig) -> Result<Self, Error> {
        let transport = Arc::new(WsTransport::connect(url, config.connect_timeout).await?);
        let waiters: Arc<WaiterTable> = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();

        tokio::spawn(reader_task(
            Arc::clone(&transport),
            Arc::clone(&waiters),
            cancel.clone(),
            config.receive_timeout,
        ));

        Ok(Self {
            inner: Arc::new(RpcInner {
                transport,
                next_id: AtomicU64::new(1),
                waiters,
                cancel,
                call_timeout: config.call_timeout,
            }),
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner.transport.state()
    }

    /// Subscribe to session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.transport.subscribe_state()
    }

    /// Issue a command under the default call budget.
    pub async fn call(&self, command: &str, args: Value) -> Result<Value, Error> {
        self.call_with_timeout(command, args, self.inner.call_timeout)
            .await
    }

    /// Issue a command and await the correlated response.
    ///
    /// On budget expiry the waiter is deregistered and the call fails with
    /// [`Error::CallTimeout`]; a response arriving later finds no waiter and
    /// is discarded. Identifiers are never reused, so a late frame can never
    /// match a newer call.
    pub async fn call_with_timeout(
        &self,
        command: &str,
        args: Value,
        budget: Duration,
    ) -> Result<Value, Error> {
        if self.state() != SessionState::Open {
            return Err(Error::NotConnected);
        }

        let message_id = self
            .inner
            .next_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();

        let (tx, rx) = oneshot::channel();
        self.inner.waiters.insert(message_id.clone(), tx);

        let request = RpcRequest::new(message_id.clone(), command, args);
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(e) => {
                self.inner.waiters.remove(&message_id);
                return Err(Error::Json(e));
            }
        };

        tracing::debug!(command, message_id, "sending request");
        if let Err(e) = self.inner.transport.send(text).await {
            self.inner.waiters.remove(&message_id);
            return Err(e);
        }

        match tokio::time::timeout(budget, rx).await {
            // Budget exhausted: abandon the call, leave no trace.
            Err(_) => {
                self.inner.waiters.remove(&message_id);
                Err(Error::CallTimeout {
                    command: command.to_owned(),
                    message_id,
                    timeout_secs: budget.as_secs(),
                })
            }
            // Sender dropped: the reader task tore down the waiter table.
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Ok(Ok(response)) => match response.remote_error() {
                Some((code, details)) => Err(Error::Remote { code, details }),
                None => Ok(response.result.unwrap_or(Value::Null)),
            },
        }
    }

    /// Tear down the reader task and close the session. Idempotent.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        self.inner.transport.close().await;
        // Fail anything still pending.
        self.inner.waiters.clear();
    }
}

// ── Reader task ──────────────────────────────────────────────────────

/// Receive every inbound frame and dispatch by correlation identifier.
///
/// Exits when the session drops or the client is closed; on exit the
/// waiter table is cleared, which resolves all pending calls with
/// [`Error::ConnectionClosed`].
async fn reader_task(
    transport: Arc<WsTransport>,
    waiters: Arc<WaiterTable>,
    cancel: CancellationToken,
    receive_timeout: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = transport.receive(receive_timeout) => {
                match frame {
                    Ok(text) => dispatch(&text, &waiters),
                    // No traffic in this window -- keep listening.
                    Err(Error::ReceiveTimeout { .. }) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "session lost, failing pending calls");
                        break;
                    }
                }
            }
        }
    }

    // Dropping the senders wakes every waiter with a closed channel.
    waiters.clear();
    tracing::debug!("reader task exiting");
}

/// Route one inbound frame to its waiter, or discard it.
fn dispatch(text: &str, waiters: &WaiterTable) {
    let response: RpcResponse = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable frame, discarding");
            return;
        }
    };

    let Some(ref message_id) = response.message_id else {
        tracing::debug!("unsolicited event, discarding");
        return;
    };

    match waiters.remove(message_id) {
        Some((_, tx)) => {
            // A failed send means the caller already timed out.
            let _ = tx.send(response);
        }
        None => {
            tracing::debug!(message_id, "no waiter for frame (late or out-of-band), discarding");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config() {
        let config = RpcClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.call_timeout, Duration::from_secs(20));
        assert_eq!(config.receive_timeout, Duration::from_secs(1));
    }

    #[test]
    fn dispatch_resolves_matching_waiter() {
        let waiters: WaiterTable = DashMap::new();
        let (tx, mut rx) = oneshot::channel();
        waiters.insert("5".to_owned(), tx);

        dispatch(r#"{"message_id": "5", "result": {"ok": true}}"#, &waiters);

        let response = rx.try_recv().unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));
        assert!(waiters.is_empty());
    }

    #[test]
    fn dispatch_discards_unmatched_frame() {
        let waiters: WaiterTable = DashMap::new();
        let (tx, mut rx) = oneshot::channel();
        waiters.insert("5".to_owned(), tx);

        dispatch(r#"{"message_id": "99", "result": null}"#, &waiters);

        assert!(rx.try_recv().is_err());
        assert_eq!(waiters.len(), 1);
    }

    #[test]
    fn dispatch_discards_events_and_garbage() {
        let waiters: WaiterTable = DashMap::new();
        dispatch(r#"{"event": "node_updated"}"#, &waiters);
        dispatch("not json at all", &waiters);
        assert!(waiters.is_empty());
    }
}
