//! Storage seam for users, profiles and payments.
//!
//! The gate only needs [`IdentityDirectory::find`]; the rest backs the
//! user and payment routes. [`MemoryDirectory`] and [`MemoryLedger`] are
//! the shipped implementations.

pub mod memory;
pub mod types;

pub use memory::{MemoryDirectory, MemoryLedger};
pub use types::{NewPayment, NewUser, Payment, Profile, UserRecord, UserUpdate};

use crate::error::ApiError;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Directory operation result.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user {0} not found")]
    NotFound(Uuid),

    #[error("email already taken: {0}")]
    DuplicateEmail(String),

    #[error("directory backend error")]
    Backend(#[source] anyhow::Error),
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(id) => crate::error::not_found("user", id),
            DirectoryError::DuplicateEmail(email) => ApiError::Conflict(email),
            DirectoryError::Backend(err) => ApiError::Internal(err),
        }
    }
}

/// User lookup and maintenance.
#[async_trait]
pub trait IdentityDirectory: Send + Sync + 'static {
    /// Look up a user by id.
    async fn find(&self, id: Uuid) -> DirectoryResult<Option<UserRecord>>;

    /// All users, oldest first.
    async fn list(&self) -> DirectoryResult<Vec<UserRecord>>;

    /// Create a user. Emails are unique.
    async fn insert(&self, user: NewUser) -> DirectoryResult<UserRecord>;

    /// Apply a partial update.
    async fn update(&self, id: Uuid, update: UserUpdate) -> DirectoryResult<UserRecord>;

    /// Replace a user's profile.
    async fn set_profile(&self, id: Uuid, profile: Profile) -> DirectoryResult<UserRecord>;

    /// Delete a user.
    async fn remove(&self, id: Uuid) -> DirectoryResult<()>;
}

/// Per-user payment history.
#[async_trait]
pub trait PaymentLedger: Send + Sync + 'static {
    /// Payments recorded for `user_id`, oldest first.
    async fn list_for(&self, user_id: Uuid) -> DirectoryResult<Vec<Payment>>;

    /// Record a payment for `user_id`.
    async fn record(&self, user_id: Uuid, payment: NewPayment) -> DirectoryResult<Payment>;
}
