//! HTTP-facing error type and the JSON envelopes shared by all handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;
use crate::validation::ValidationError;

const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred. This is a problem on our \
side and we are actively working to resolve it. We apologize for any inconvenience. If you need \
immediate help, please contact our support team. Thank you for your patience.";

/// Error codes returned in `detail.name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    InvalidData,
    InternalServerError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            Self::BadRequest | Self::InvalidData => StatusCode::BAD_REQUEST,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidData => "INVALID_DATA",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// The body could not be turned into a submission (missing field, unknown
    /// enum label, malformed multipart or JSON).
    #[error("{0}")]
    Decode(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    InvalidData(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Decode(_) | Self::Storage(_) => ErrorCode::BadRequest,
            Self::Validation(_) | Self::InvalidData(_) => ErrorCode::InvalidData,
            Self::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    /// Message exposed to the caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Decode(msg) => msg.clone(),
            Self::Validation(err) => format!("Invalid input data: {}", err.message),
            Self::InvalidData(msg) => format!("Invalid input data: {}", msg),
            Self::Storage(err) => err.to_string(),
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub name: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Unhandled error: {:#}", err);
        }

        let code = self.code();
        let body = ErrorBody {
            detail: ErrorDetail {
                name: code.name(),
                message: self.public_message(),
            },
        };
        (code.status(), Json(body)).into_response()
    }
}

/// Success envelope: `{ "data": ..., "meta": {} }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::check_email;

    #[test]
    fn test_validation_maps_to_invalid_data() {
        let err: AppError = check_email(Some("nope")).unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::InvalidData);
        assert_eq!(err.code().status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid input data: Invalid email.");
    }

    #[test]
    fn test_internal_hides_details() {
        let err = AppError::Internal(anyhow::anyhow!("db password is hunter2"));
        assert_eq!(err.code().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("hunter2"));
    }

    #[test]
    fn test_storage_error_is_bad_request_with_provider_message() {
        let err: AppError = StorageError::new("Drive upload failed (403): quota exceeded").into();
        assert_eq!(err.code().name(), "BAD_REQUEST");
        assert!(err.public_message().contains("quota exceeded"));
    }

    #[test]
    fn test_success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::new("ok")).unwrap();
        assert_eq!(body, serde_json::json!({ "data": "ok", "meta": {} }));
    }
}
