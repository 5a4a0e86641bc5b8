//! API error types.

use axum::http::StatusCode;
use std::collections::HashMap;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error enum covering all error cases.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    ValidationError(HashMap<String, Vec<String>>),

    // 401 Unauthorized
    #[error("Please authenticate")]
    Unauthenticated,

    // 403 Forbidden
    #[error("Forbidden")]
    Forbidden,

    // 404 Not Found
    #[error("{0} not found")]
    NotFound(String),

    #[error("Resource not found")]
    ResourceNotFound { resource: String, id: String },

    // 409 Conflict
    #[error("Resource already exists: {0}")]
    Conflict(String),

    // 500 Internal Server Error
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,

            Self::Unauthenticated => StatusCode::UNAUTHORIZED,

            Self::Forbidden => StatusCode::FORBIDDEN,

            Self::NotFound(_) | Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,

            Self::Conflict(_) => StatusCode::CONFLICT,

            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::ValidationError(_) => "validation_error",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Check if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// True for the two outcomes the authorization gate can produce.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Forbidden)
    }
}
