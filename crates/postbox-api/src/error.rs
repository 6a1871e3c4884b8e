use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use postbox_types::api::ErrorResponse;

/// Every way a request can fail. The variant picks the status code; the
/// text of the client-facing variants is sent back as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, empty or malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    /// Still a 400: a missing message is reported as a bad request.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Logged with the failing operation; the client only sees a generic text.
    #[error("{op}: {source:#}")]
    Internal {
        op: &'static str,
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(op: &'static str, err: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal {
            op,
            source: err.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Duplicate(_) | ApiError::NotFound(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Validation(msg)
            | ApiError::Duplicate(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg) => msg,
            ApiError::Internal { op, source } => {
                error!(operation = op, "{:#}", source);
                "internal server error".to_string()
            }
        };

        render(status, &ErrorResponse { message })
    }
}

/// Serialize `body` as the response with an explicit UTF-8 JSON content type.
pub fn render<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode response body: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
