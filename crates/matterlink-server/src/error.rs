//! HTTP error mapping.
//!
//! Every domain failure is folded into a uniform `{code, message}` JSON
//! body with a status chosen by category. Nothing here ever panics a
//! request handler.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use matterlink_core::CoreError;

/// Uniform error body returned by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Core(core) => match core {
                CoreError::DeviceNotFound { .. } | CoreError::JobNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                CoreError::InvalidArgument { .. } | CoreError::UnsupportedCommand { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                CoreError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                CoreError::Remote { .. } => StatusCode::BAD_GATEWAY,
                CoreError::Config { .. } | CoreError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Core(core) => match core {
                CoreError::DeviceNotFound { .. } => "device_not_found",
                CoreError::JobNotFound { .. } => "job_not_found",
                CoreError::InvalidArgument { .. } => "invalid_argument",
                CoreError::UnsupportedCommand { .. } => "unsupported_command",
                CoreError::Timeout { .. } => "timeout",
                CoreError::ServiceUnavailable { .. } => "service_unavailable",
                CoreError::Remote { .. } => "bridge_error",
                CoreError::Config { .. } => "config_error",
                CoreError::Internal(_) => "internal_error",
            },
            Self::InvalidBody(_) => "invalid_body",
            Self::Database(_) => "database_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn status_of(err: CoreError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    #[test]
    fn category_to_status_mapping() {
        assert_eq!(
            status_of(CoreError::DeviceNotFound { node_id: 1 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::JobNotFound {
                job_id: uuid::Uuid::nil()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::InvalidArgument {
                message: "x".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CoreError::UnsupportedCommand {
                command: "disco".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CoreError::Timeout {
                command: "get_nodes".into(),
                timeout_secs: 20
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(CoreError::ServiceUnavailable { reason: "x".into() }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(CoreError::Remote {
                code: "9".into(),
                details: "x".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CoreError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn remote_diagnostic_survives_into_the_body() {
        let err = ApiError::from(CoreError::Remote {
            code: "9".into(),
            details: "node 12 is not commissioned".into(),
        });
        assert!(err.to_string().contains("node 12 is not commissioned"));
        assert_eq!(err.code(), "bridge_error");
    }
}
