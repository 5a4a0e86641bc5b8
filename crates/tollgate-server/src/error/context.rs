//! Error construction helpers.

use super::types::ApiError;

/// Create a not found error for a specific resource.
pub fn not_found(resource: &str, id: impl ToString) -> ApiError {
    ApiError::ResourceNotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}
