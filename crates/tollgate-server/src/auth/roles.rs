//! Role to rights registry.
//!
//! Every [`Role`] maps to a set of [`Right`]s. The table is built once at
//! startup, checked for completeness, and shared read-only afterwards.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Rights known to the built-in routes.
pub mod rights {
    use super::Right;

    pub const GET_USERS: Right = Right::from_static("getUsers");
    pub const MANAGE_USERS: Right = Right::from_static("manageUsers");
    pub const GET_PAYMENTS: Right = Right::from_static("getPayments");
    pub const MANAGE_PAYMENTS: Right = Right::from_static("managePayments");
}

/// Class of caller identity. One per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// Lowest privilege role, assigned when none is given.
    pub const DEFAULT: Role = Role::User;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownRole(s.to_string()))
    }
}

/// A single permitted action. Opaque; rights never imply each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Right(Cow<'static, str>);

impl Right {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Right {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// Registry construction errors. Raised at startup only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("role {0} has no entry in the rights table")]
    MissingRole(Role),

    #[error("right names must not be empty (role {0})")]
    EmptyRight(Role),
}

const ROLE_COUNT: usize = Role::ALL.len();

static BUILTIN: Lazy<Arc<RoleRegistry>> = Lazy::new(|| Arc::new(RoleRegistry::builtin()));

/// Read-only role to rights table.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    // Indexed by `Role::index`, so every role has a slot.
    rights: [HashSet<Right>; ROLE_COUNT],
}

impl RoleRegistry {
    /// The default table: users hold nothing, admins hold every built-in right.
    pub fn builtin() -> Self {
        Self {
            rights: [
                HashSet::new(),
                HashSet::from([
                    rights::GET_USERS,
                    rights::MANAGE_USERS,
                    rights::GET_PAYMENTS,
                    rights::MANAGE_PAYMENTS,
                ]),
            ],
        }
    }

    /// Shared instance of [`RoleRegistry::builtin`].
    pub fn global() -> Arc<RoleRegistry> {
        BUILTIN.clone()
    }

    /// Build from a `role name -> [right]` table, as found in configuration.
    ///
    /// The table must name every role exactly; unknown names and missing
    /// roles are rejected so a bad table fails the process at startup.
    pub fn from_table<I, R>(table: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = String>,
    {
        let mut entries: HashMap<Role, HashSet<Right>> = HashMap::new();
        for (name, granted) in table {
            let role: Role = name.parse()?;
            let set = entries.entry(role).or_default();
            for right in granted {
                if right.trim().is_empty() {
                    return Err(RegistryError::EmptyRight(role));
                }
                set.insert(Right::new(right));
            }
        }

        let mut rights: [HashSet<Right>; ROLE_COUNT] = Default::default();
        for role in Role::ALL {
            rights[role.index()] = entries
                .remove(&role)
                .ok_or(RegistryError::MissingRole(role))?;
        }

        Ok(Self { rights })
    }

    /// Rights held by `role`. Defined for every role.
    pub fn rights_of(&self, role: Role) -> &HashSet<Right> {
        &self.rights[role.index()]
    }

    /// Whether `role` holds every right in `required`.
    pub fn grants_all<'a, I>(&self, role: Role, required: I) -> bool
    where
        I: IntoIterator<Item = &'a Right>,
    {
        let held = self.rights_of(role);
        required.into_iter().all(|right| held.contains(right))
    }

    /// Roles that hold `right`.
    pub fn roles_with(&self, right: &Right) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.rights_of(*role).contains(right))
            .collect()
    }

    /// Sorted snapshot of the table, for listing.
    pub fn to_table(&self) -> BTreeMap<Role, Vec<Right>> {
        Role::ALL
            .into_iter()
            .map(|role| {
                let mut granted: Vec<Right> = self.rights_of(role).iter().cloned().collect();
                granted.sort();
                (role, granted)
            })
            .collect()
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
