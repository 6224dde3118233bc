//! Wire envelopes for the bridge server's message contract.
//!
//! Every request is `{message_id, command, args}`; every response or event
//! is `{message_id?, result?, error_code?, details?}`. A missing
//! `message_id` marks an unsolicited event. Unknown fields are tolerated
//! so newer server versions don't break deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command names understood by the bridge server.
pub mod commands {
    /// Subscribe to server-pushed events. No args.
    pub const START_LISTENING: &str = "start_listening";
    /// Fetch all node descriptors.
    pub const GET_NODES: &str = "get_nodes";
    /// Pair a new node using a setup code. Slow -- needs a large call budget.
    pub const COMMISSION_WITH_CODE: &str = "commission_with_code";
    /// Remove a node from the fabric.
    pub const REMOVE_NODE: &str = "remove_node";
    /// Run a cluster command on a node endpoint.
    pub const DEVICE_COMMAND: &str = "device_command";
}

// ── Request ──────────────────────────────────────────────────────────

/// An outgoing RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Correlation identifier: monotonically increasing, never reused.
    pub message_id: String,
    pub command: String,
    /// Command arguments; an empty object when the command takes none.
    pub args: Value,
}

impl RpcRequest {
    pub fn new(message_id: String, command: &str, args: Value) -> Self {
        Self {
            message_id,
            command: command.to_owned(),
            args,
        }
    }
}

// ── Response / event ─────────────────────────────────────────────────

/// An inbound frame: a correlated response or an unsolicited event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Absent on unsolicited events.
    #[serde(default)]
    pub message_id: Option<String>,

    /// Payload on success. Shape depends on the command.
    #[serde(default)]
    pub result: Option<Value>,

    /// Present when the server rejected the request. The server is not
    /// consistent about the code's JSON type, so it stays a raw `Value`.
    #[serde(default)]
    pub error_code: Option<Value>,

    /// Human-readable remote diagnostic accompanying `error_code`.
    #[serde(default)]
    pub details: Option<String>,

    /// Everything else the server sends.
    #[serde(flatten)]
    pub extra: Value,
}

impl RpcResponse {
    /// Unsolicited event (no correlation identifier)?
    pub fn is_event(&self) -> bool {
        self.message_id.is_none()
    }

    /// Extract the remote error, if the server reported one.
    pub fn remote_error(&self) -> Option<(String, String)> {
        let code = self.error_code.as_ref()?;
        let code = match code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let details = self
            .details
            .clone()
            .unwrap_or_else(|| "no details provided".to_owned());
        Some((code, details))
    }
}

// ── Node descriptor ──────────────────────────────────────────────────

/// Raw node descriptor as returned by `get_nodes`.
///
/// `attributes` is keyed by hierarchical `"<endpoint>/<cluster>/<attribute>"`
/// path strings. Descriptors without a resolvable `node_id` fail to
/// deserialize and must be skipped (and logged) by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub node_id: u64,

    /// Reachability as reported by the server.
    #[serde(default)]
    pub available: bool,

    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

// ── Tests ────────────────────────────────────────────────────────────
