use thiserror::Error;

/// Top-level error type for the `matterlink-api` crate.
///
/// Covers every failure mode on the wire: connection establishment,
/// frame transport, RPC correlation, and remote-reported errors.
/// `matterlink-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    /// Operation attempted while the session is not open.
    #[error("Not connected to the bridge server")]
    NotConnected,

    /// The peer terminated the session (or the stream ended).
    #[error("Connection closed by the bridge server")]
    ConnectionClosed,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Correlation ─────────────────────────────────────────────────
    /// No inbound frame arrived within the receive window.
    /// Soft condition -- distinct from [`ConnectionClosed`](Self::ConnectionClosed).
    #[error("No inbound frame within {timeout_ms}ms")]
    ReceiveTimeout { timeout_ms: u64 },

    /// No matching response arrived within the call budget.
    /// The call is abandoned; a late response is silently discarded.
    #[error("No response for command '{command}' (message id {message_id}) within {timeout_secs}s")]
    CallTimeout {
        command: String,
        message_id: String,
        timeout_secs: u64,
    },

    // ── Remote ──────────────────────────────────────────────────────
    /// The bridge server answered with an `error_code`.
    /// `details` carries the remote diagnostic verbatim.
    #[error("Bridge server error (code {code}): {details}")]
    Remote { code: String, details: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON encoding/decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the transport is gone and a reconnect is needed.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::NotConnected | Self::ConnectionClosed
        )
    }

    /// Returns `true` if this is a timeout (the session itself may be fine).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReceiveTimeout { .. } | Self::CallTimeout { .. })
    }
}
