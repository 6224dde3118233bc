//! Transport session: one duplex WebSocket connection to the bridge server.
//!
//! Owns the single connection and exposes framed text send/receive with
//! explicit timeouts. A lost connection is reported as
//! [`Error::ConnectionClosed`], distinct from the soft
//! [`Error::ReceiveTimeout`] raised when no frame arrives in the window.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── SessionState ─────────────────────────────────────────────────────

/// Lifecycle of the duplex session. All RPC traffic requires `Open`.
/// A session is born `Open`; establishment failures surface as
/// [`Error::Connect`] before any state is observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Open,
    Closing,
}

// ── WsTransport ──────────────────────────────────────────────────────

/// A connected WebSocket session.
///
/// Send and receive halves are independently lockable so one task can
/// block on `receive` while others `send`. The correlation layer keeps a
/// single dedicated reader; `receive` is not meant for concurrent callers.
pub struct WsTransport {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
    state: watch::Sender<SessionState>,
}

impl WsTransport {
    /// Establish the duplex channel, failing after `timeout` elapses.
    pub async fn connect(url: &Url, timeout: Duration) -> Result<Self, Error> {
        tracing::info!(url = %url, "connecting to bridge server");

        let connect = tokio_tungstenite::connect_async(url.as_str());
        let (stream, _response) = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| Error::Connect(format!("timed out after {}s", timeout.as_secs())))?
            .map_err(|e| Error::Connect(e.to_string()))?;

        tracing::info!("bridge server connection established");

        let (writer, reader) = stream.split();
        let (state, _) = watch::channel(SessionState::Open);

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            state,
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Send one text frame. Fails fast when the session is not open.
    pub async fn send(&self, text: String) -> Result<(), Error> {
        if self.state() != SessionState::Open {
            return Err(Error::NotConnected);
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Text(text.into())).await {
            tracing::warn!(error = %e, "send failed, marking session disconnected");
            // send_replace updates the state even with no subscribers
            self.state.send_replace(SessionState::Disconnected);
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Receive the next inbound text frame, waiting at most `timeout`.
    ///
    /// Ping/pong/binary frames are skipped within the same deadline
    /// (tungstenite answers pings automatically). A close frame or stream
    /// end marks the session disconnected and returns
    /// [`Error::ConnectionClosed`].
    pub async fn receive(&self, timeout: Duration) -> Result<String, Error> {
        if self.state() != SessionState::Open {
            return Err(Error::NotConnected);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut reader = self.reader.lock().await;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(Error::ReceiveTimeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }

            let frame = match tokio::time::timeout(remaining, reader.next()).await {
                Err(_) => {
                    return Err(Error::ReceiveTimeout {
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                Ok(frame) => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                    } else {
                        tracing::info!("close frame received (no payload)");
                    }
                    self.state.send_replace(SessionState::Disconnected);
                    return Err(Error::ConnectionClosed);
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite replies with a pong automatically
                    tracing::trace!("ping");
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- not part of the contract
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "receive failed, marking session disconnected");
                    self.state.send_replace(SessionState::Disconnected);
                    return Err(Error::ConnectionClosed);
                }
                None => {
                    tracing::info!("stream ended");
                    self.state.send_replace(SessionState::Disconnected);
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }

    /// Close the session. Idempotent; always succeeds.
    pub async fn close(&self) {
        if self.state() == SessionState::Disconnected {
            return;
        }
        self.state.send_replace(SessionState::Closing);

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            tracing::debug!(error = %e, "close handshake failed (already gone)");
        }

        self.state.send_replace(SessionState::Disconnected);
        tracing::info!("bridge server connection closed");
    }
}
