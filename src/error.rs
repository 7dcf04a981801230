/// Unified error types for the account service
use crate::token::TokenError;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, JsonRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for account operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed request fields
    #[error("{0}")]
    InvalidInput(String),

    /// Duplicate username or email
    #[error("{0}")]
    Conflict(String),

    /// No such user
    #[error("{0}")]
    NotFound(String),

    /// Request body over the configured upload limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Body sent with a content type the route does not read
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Bad credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Refresh/access token failures, kept distinct per kind
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Media host rejected or could not receive the file
    #[error("{0}")]
    UploadFailed(String),

    /// Unexpected failure during persistence or orchestration
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT signing errors
    #[error("JWT error: {0}")]
    Jwt(String),
}

impl ApiError {
    /// HTTP status and stable error code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "InvalidInput"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge"),
            ApiError::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UnsupportedMediaType")
            }
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Token(kind) => (StatusCode::UNAUTHORIZED, kind.code()),
            ApiError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, "UploadFailed"),
            ApiError::Internal(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Jwt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError"),
        }
    }

    /// Map an extractor rejection onto the error envelope, keeping its status class
    fn from_rejection(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(message),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::UnsupportedMediaType(message),
            _ => ApiError::InvalidInput(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::from_rejection(error.status(), error.body_text())
    }
}

/// JSON error envelope
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub error: String,
    pub message: String,
    pub success: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let hide_detail = status.is_server_error() && !matches!(self, ApiError::UploadFailed(_));
        let message = if hide_detail {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        crate::metrics::record_error(error_code);

        let body = Json(ErrorEnvelope {
            status_code: status.as_u16(),
            error: error_code.to_string(),
            message,
            success: false,
        });

        (status, body).into_response()
    }
}

/// Result type alias for account service operations
pub type ApiResult<T> = Result<T, ApiError>;
