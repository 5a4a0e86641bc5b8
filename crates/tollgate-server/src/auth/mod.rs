//! Request authentication and authorization.
//!
//! - [`roles`]: the role to rights registry
//! - [`verifier`]: single-shot adapter over callback-style strategies
//! - [`jwt`]: the bearer token strategy
//! - [`decision`]: rights-or-ownership decision
//! - [`gate`]: tower middleware tying it together

pub mod decision;
pub mod gate;
pub mod identity;
pub mod jwt;
pub mod roles;
pub mod verifier;

pub use decision::{decide, Decision, DenyReason};
pub use gate::{Gate, GateLayer, GateService, GateState, DEFAULT_OWNER_PARAM};
pub use identity::{CurrentIdentity, Identity};
pub use jwt::{decode_token, encode_token, Claims, JwtStrategy, TokenType};
pub use roles::{rights, RegistryError, Right, Role, RoleRegistry};
pub use verifier::{strategy_fn, Done, Strategy, StrategyFn, TokenVerifier, Unauthenticated};
