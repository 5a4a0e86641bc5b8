//! Allow/deny decision for a verified caller.

use super::{identity::Identity, roles::Right, roles::RoleRegistry};
use crate::error::ApiError;
use std::fmt;
use uuid::Uuid;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No verifiable identity.
    Unauthenticated,
    /// Verified, but lacks the rights and does not own the resource.
    Forbidden,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => ApiError::Unauthenticated,
            DenyReason::Forbidden => ApiError::Forbidden,
        }
    }
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Identity),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    /// The identity to attach, or the error to forward.
    pub fn into_result(self) -> Result<Identity, ApiError> {
        match self {
            Self::Allow(identity) => Ok(identity),
            Self::Deny(reason) => Err(reason.into()),
        }
    }
}

/// Decide whether `identity` may proceed.
///
/// Rights are checked first; owning the resource is the fallback. An empty
/// requirement only asks for a verified identity. A missing `owner` never
/// matches.
pub fn decide(
    registry: &RoleRegistry,
    identity: Identity,
    required: &[Right],
    owner: Option<Uuid>,
) -> Decision {
    if required.is_empty() {
        return Decision::Allow(identity);
    }

    if registry.grants_all(identity.role, required) {
        return Decision::Allow(identity);
    }

    if owner.is_some_and(|owner| identity.owns(owner)) {
        return Decision::Allow(identity);
    }

    Decision::Deny(DenyReason::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::{rights, Role};
    use proptest::prelude::*;

    fn caller(role: Role) -> Identity {
        Identity::new(Uuid::new_v4(), role, "Test", "test@example.com")
    }

    #[test]
    fn test_user_owner_is_allowed() {
        let registry = RoleRegistry::builtin();
        let user = caller(Role::User);
        let owner = Some(user.id);

        let decision = decide(&registry, user, &[rights::MANAGE_USERS], owner);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_admin_with_rights_is_allowed_for_other_owner() {
        let registry = RoleRegistry::builtin();
        let admin = caller(Role::Admin);

        let decision = decide(&registry, admin, &[rights::MANAGE_USERS], Some(Uuid::new_v4()));
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_user_without_rights_or_ownership_is_forbidden() {
        let registry = RoleRegistry::builtin();
        let user = caller(Role::User);

        let decision = decide(&registry, user, &[rights::MANAGE_USERS], Some(Uuid::new_v4()));
        assert_eq!(decision, Decision::Deny(DenyReason::Forbidden));
    }

    #[test]
    fn test_missing_owner_never_overrides() {
        let registry = RoleRegistry::builtin();
        let user = caller(Role::User);

        let decision = decide(&registry, user, &[rights::GET_USERS], None);
        assert_eq!(decision, Decision::Deny(DenyReason::Forbidden));
    }

    #[test]
    fn test_no_requirement_allows_everyone() {
        let registry = RoleRegistry::builtin();
        for role in Role::ALL {
            assert!(decide(&registry, caller(role), &[], None).is_allowed());
        }
    }

    #[test]
    fn test_all_rights_must_be_held() {
        let registry = RoleRegistry::builtin();
        let admin = caller(Role::Admin);

        let decision = decide(
            &registry,
            admin,
            &[rights::MANAGE_USERS, Right::new("deleteEverything")],
            None,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::Forbidden));
    }

    #[test]
    fn test_into_result_maps_reasons() {
        let denied = Decision::Deny(DenyReason::Unauthenticated).into_result();
        assert!(matches!(denied, Err(ApiError::Unauthenticated)));
        let denied = Decision::Deny(DenyReason::Forbidden).into_result();
        assert!(matches!(denied, Err(ApiError::Forbidden)));
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::User), Just(Role::Admin)]
    }

    fn any_rights() -> impl Strategy<Value = Vec<Right>> {
        prop::collection::vec(
            prop_oneof![
                Just(rights::GET_USERS),
                Just(rights::MANAGE_USERS),
                Just(rights::GET_PAYMENTS),
                Just(rights::MANAGE_PAYMENTS),
                "[a-z]{1,8}".prop_map(|name: String| Right::new(name)),
            ],
            0..5,
        )
    }

    proptest! {
        /// Property: the decision is exactly "rights OR ownership".
        #[test]
        fn test_decision_matches_rule(
            role in any_role(),
            required in any_rights(),
            own in any::<bool>(),
            has_owner in any::<bool>(),
        ) {
            let registry = RoleRegistry::builtin();
            let identity = caller(role);
            let owner = match (has_owner, own) {
                (false, _) => None,
                (true, true) => Some(identity.id),
                (true, false) => Some(Uuid::new_v4()),
            };

            let held = registry.rights_of(role);
            let expected = required.iter().all(|r| held.contains(r))
                || owner == Some(identity.id);

            let decision = decide(&registry, identity.clone(), &required, owner);
            prop_assert_eq!(decision.is_allowed(), expected);
            if let Decision::Allow(allowed) = decision {
                prop_assert_eq!(allowed, identity);
            } else {
                prop_assert_eq!(decision, Decision::Deny(DenyReason::Forbidden));
            }
        }

        /// Property: owners always get through, whatever they ask for.
        #[test]
        fn test_owner_always_allowed(role in any_role(), required in any_rights()) {
            let registry = RoleRegistry::builtin();
            let identity = caller(role);
            let owner = Some(identity.id);
            prop_assert!(decide(&registry, identity, &required, owner).is_allowed());
        }
    }
}
