//! Verified caller identity and its handler extractor.

use super::roles::Role;
use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use uuid::Uuid;

/// A caller whose credential has been verified.
///
/// Only the token verifier produces these; the gate attaches one to the
/// request extensions when it lets a request through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(id: Uuid, role: Role, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            role,
            name: name.into(),
            email: email.into(),
        }
    }

    /// Whether this caller is `owner`.
    pub fn owns(&self, owner: Uuid) -> bool {
        self.id == owner
    }
}

/// Extractor for the identity attached by the gate.
///
/// Rejects with `Unauthenticated` on routes that are not behind the gate.
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or(ApiError::Unauthenticated)
    }
}
