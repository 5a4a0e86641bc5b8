//! In-memory directory and ledger.

use super::{
    types::{NewPayment, NewUser, Payment, Profile, UserRecord, UserUpdate},
    DirectoryError, DirectoryResult, IdentityDirectory, PaymentLedger,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Users held in a concurrent map.
///
/// Emails are claimed in a second map keyed by the lowercased address, so
/// uniqueness holds without a check-then-write window.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<Uuid, UserRecord>,
    emails: DashMap<String, Uuid>,
}

fn email_key(email: &str) -> String {
    email.to_ascii_lowercase()
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing records. A later record with a taken email is
    /// skipped.
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let directory = Self::new();
        for user in users {
            if directory.claim_email(&user.email, user.id).is_err() {
                warn!(
                    user_id = %user.id,
                    email = %user.email,
                    "Skipping user with duplicate email"
                );
                continue;
            }
            directory.users.insert(user.id, user);
        }
        directory
    }

    /// Load a JSON array of user records.
    pub fn from_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let users: Vec<UserRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

        let directory = Self::with_users(users);
        if directory.is_empty() {
            warn!(path = %path.display(), "User seed is empty");
        } else {
            info!(path = %path.display(), count = directory.len(), "Loaded user seed");
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Reserve `email` for `id`. Succeeds if it is free or already `id`'s.
    fn claim_email(&self, email: &str, id: Uuid) -> DirectoryResult<()> {
        match self.emails.entry(email_key(email)) {
            Entry::Occupied(owner) if *owner.get() != id => {
                Err(DirectoryError::DuplicateEmail(email.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn release_email(&self, email: &str, id: Uuid) {
        self.emails.remove_if(&email_key(email), |_, owner| *owner == id);
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn find(&self, id: Uuid) -> DirectoryResult<Option<UserRecord>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> DirectoryResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> DirectoryResult<UserRecord> {
        let id = Uuid::new_v4();
        self.claim_email(&user.email, id)?;

        let record = UserRecord {
            id,
            name: user.name,
            email: user.email,
            role: user.role,
            profile: Profile::default(),
            created_at: Utc::now(),
        };
        self.users.insert(record.id, record.clone());
        debug!(user_id = %record.id, "User created");
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> DirectoryResult<UserRecord> {
        let mut entry = self.users.get_mut(&id).ok_or(DirectoryError::NotFound(id))?;

        if let Some(email) = update.email {
            self.claim_email(&email, id)?;
            if email_key(&email) != email_key(&entry.email) {
                self.release_email(&entry.email, id);
            }
            entry.email = email;
        }
        if let Some(name) = update.name {
            entry.name = name;
        }
        if let Some(role) = update.role {
            entry.role = role;
        }
        Ok(entry.clone())
    }

    async fn set_profile(&self, id: Uuid, profile: Profile) -> DirectoryResult<UserRecord> {
        let mut entry = self.users.get_mut(&id).ok_or(DirectoryError::NotFound(id))?;
        entry.profile = profile;
        Ok(entry.clone())
    }

    async fn remove(&self, id: Uuid) -> DirectoryResult<()> {
        let (_, user) = self.users.remove(&id).ok_or(DirectoryError::NotFound(id))?;
        self.release_email(&user.email, id);
        Ok(())
    }
}

/// Payments keyed by user.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    payments: DashMap<Uuid, Vec<Payment>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentLedger for MemoryLedger {
    async fn list_for(&self, user_id: Uuid) -> DirectoryResult<Vec<Payment>> {
        Ok(self
            .payments
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn record(&self, user_id: Uuid, payment: NewPayment) -> DirectoryResult<Payment> {
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency.to_uppercase(),
            description: payment.description,
            created_at: Utc::now(),
        };
        self.payments
            .entry(user_id)
            .or_default()
            .push(payment.clone());
        Ok(payment)
    }
}
