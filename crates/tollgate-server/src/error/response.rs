//! Centralized error response rendering.

use super::types::ApiError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, warn};

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(error = ?self, code = self.error_code(), "Server error occurred");
        } else if self.is_auth_error() {
            warn!(code = self.error_code(), "Request rejected by gate");
        }

        let status = self.status_code();
        let code = self.error_code();

        let (message, details, fields) = match &self {
            ApiError::ValidationError(field_errors) => {
                (self.to_string(), None, Some(field_errors.clone()))
            }
            ApiError::ResourceNotFound { resource, id } => {
                let details = serde_json::json!({
                    "resource": resource,
                    "id": id
                });
                (self.to_string(), Some(details), None)
            }
            ApiError::Internal(err) => {
                // Don't expose internal error details in production
                let message = if cfg!(debug_assertions) {
                    format!("{}: {:#}", self, err)
                } else {
                    "An internal error occurred".to_string()
                };
                (message, None, None)
            }
            _ => (self.to_string(), None, None),
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
                fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        ApiError::ValidationError(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthenticated_body() {
        let (status, body) = body_json(ApiError::Unauthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "unauthenticated");
        assert_eq!(body["error"]["message"], "Please authenticate");
    }

    #[tokio::test]
    async fn test_forbidden_body() {
        let (status, body) = body_json(ApiError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_resource_not_found_details() {
        let err = ApiError::ResourceNotFound {
            resource: "user".into(),
            id: "42".into(),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["details"]["id"], "42");
    }
}
