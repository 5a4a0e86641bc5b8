//! Directory records and request bodies.

use crate::auth::{Identity, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Stored user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// The identity the gate attaches for this user.
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.role, self.name.clone(), self.email.clone())
    }
}

/// Free-form profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
}

/// Body of `POST /users`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Body of `PATCH /users/:userId`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}

/// Recorded payment.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /users/:userId/payments`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPayment {
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}
