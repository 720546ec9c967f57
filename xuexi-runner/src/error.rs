//! Error types for xuexi-runner
//!
//! HTTP handlers return [`ApiError`], rendered as
//! `{"error": {"code": ..., "message": ...}}`.

use crate::session::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Session control error (409/412/400/502 depending on kind)
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Upstream collaborator failed (502)
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// xuexi-common error
    #[error("Common error: {0}")]
    Common(#[from] xuexi_common::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Session(e) => match e {
                SessionError::AlreadyRunning => (StatusCode::CONFLICT, "ALREADY_RUNNING"),
                SessionError::NotRunning => (StatusCode::CONFLICT, "NOT_RUNNING"),
                SessionError::NotPaused => (StatusCode::CONFLICT, "NOT_PAUSED"),
                SessionError::NotConnected => (StatusCode::PRECONDITION_FAILED, "NOT_CONNECTED"),
                SessionError::ConnectionFailure(_) => (StatusCode::BAD_GATEWAY, "CONNECTION_FAILED"),
                SessionError::InvalidStages(_) => (StatusCode::BAD_REQUEST, "INVALID_STAGES"),
            },
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
