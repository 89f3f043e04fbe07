// Error handling
// Maps session and settlement errors onto HTTP status codes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use potsplit_sessions::Error as SessionError;
use potsplit_settlement::Error as SettlementError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::BadRequest(rejection.body_text())
    }
}

impl From<SettlementError> for GatewayError {
    fn from(err: SettlementError) -> Self {
        GatewayError::Session(SessionError::Settlement(err))
    }
}

impl GatewayError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            GatewayError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::Session(err) => match err {
                SessionError::SessionNotFound(_) | SessionError::PlayerNotFound(_) => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                SessionError::InvalidPlayerIndex(_)
                | SessionError::DuplicatePlayer(_)
                | SessionError::InvalidRecord(_)
                | SessionError::NotAllSubmitted
                | SessionError::HostHandleMissing
                | SessionError::MarginMismatch { .. }
                | SessionError::NotSettled
                | SessionError::AlreadySettled => (StatusCode::BAD_REQUEST, err.to_string()),
                SessionError::Settlement(SettlementError::Inconsistent(_)) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Settlement validation failed".to_string(),
                ),
                SessionError::Settlement(inner) => (StatusCode::BAD_REQUEST, inner.to_string()),
                SessionError::Export(_)
                | SessionError::Config(_)
                | SessionError::Serialization(_)
                | SessionError::Io(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
            GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}
