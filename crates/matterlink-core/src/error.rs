//! Error taxonomy for the domain layer.
//!
//! Transport-level failures from `matterlink-api` are folded into a small
//! set of caller-facing categories so the service boundary can map each
//! one to a status without inspecting wire details.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upstream session ─────────────────────────────────────────────
    /// The bridge server is unreachable or the session dropped.
    #[error("bridge server unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// A call exhausted its response budget.
    #[error("command '{command}' timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    /// The bridge server rejected the request. Code and details are
    /// passed through verbatim.
    #[error("bridge server error {code}: {details}")]
    Remote { code: String, details: String },

    // ── Caller input ─────────────────────────────────────────────────
    #[error("no device with node id {node_id}")]
    DeviceNotFound { node_id: u64 },

    #[error("no commissioning job {job_id}")]
    JobNotFound { job_id: Uuid },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("unsupported command '{command}'")]
    UnsupportedCommand { command: String },

    // ── Local faults ─────────────────────────────────────────────────
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<matterlink_api::Error> for CoreError {
    fn from(err: matterlink_api::Error) -> Self {
        use matterlink_api::Error as Api;
        match err {
            Api::Connect(_) | Api::NotConnected | Api::ConnectionClosed => {
                Self::ServiceUnavailable {
                    reason: err.to_string(),
                }
            }
            Api::CallTimeout {
                command,
                timeout_secs,
                ..
            } => Self::Timeout {
                command,
                timeout_secs,
            },
            Api::ReceiveTimeout { timeout_ms } => Self::Timeout {
                command: "receive".to_owned(),
                timeout_secs: timeout_ms.div_ceil(1000),
            },
            Api::Remote { code, details } => Self::Remote { code, details },
            Api::InvalidUrl(e) => Self::Config {
                message: e.to_string(),
            },
            Api::Json(e) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connection_loss_maps_to_service_unavailable() {
        let err: CoreError = matterlink_api::Error::ConnectionClosed.into();
        assert!(matches!(err, CoreError::ServiceUnavailable { .. }));
    }

    #[test]
    fn call_timeout_keeps_command_and_budget() {
        let err: CoreError = matterlink_api::Error::CallTimeout {
            command: "commission_with_code".to_owned(),
            message_id: "4".to_owned(),
            timeout_secs: 120,
        }
        .into();

        match err {
            CoreError::Timeout {
                command,
                timeout_secs,
            } => {
                assert_eq!(command, "commission_with_code");
                assert_eq!(timeout_secs, 120);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn remote_error_passes_through_verbatim() {
        let err: CoreError = matterlink_api::Error::Remote {
            code: "9".to_owned(),
            details: "node 12 is not commissioned".to_owned(),
        }
        .into();

        match err {
            CoreError::Remote { code, details } => {
                assert_eq!(code, "9");
                assert_eq!(details, "node 12 is not commissioned");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }
}
