//! Request authorization gate.
//!
//! Every protected route is wrapped in a [`GateLayer`]. Per request the gate
//! verifies the credential, decides against the route's required rights and
//! the owner id in the path, then either attaches the [`Identity`] and calls
//! the handler or returns the classified [`ApiError`].
//!
//! Apply with `route_layer` (or `MethodRouter::layer`) so the matched path
//! parameters are visible to the gate:
//!
//! ```ignore
//! Router::new().route(
//!     "/users/:userId",
//!     get(get_user).route_layer(gate.require([rights::GET_USERS])),
//! )
//! ```

use super::{
    decision::{decide, Decision, DenyReason},
    identity::Identity,
    roles::{Right, RoleRegistry},
    verifier::TokenVerifier,
};
use crate::error::ApiError;
use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams},
    http::{request::Parts, Request},
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Path parameter holding the owning user's id, unless configured otherwise.
pub const DEFAULT_OWNER_PARAM: &str = "userId";

/// Where a single gate evaluation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Verifying,
    VerificationFailed,
    Verified,
    Deciding,
    Denied,
    Allowed,
}

impl GateState {
    /// Whether the evaluation has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::VerificationFailed | Self::Denied | Self::Allowed)
    }

    /// Legal transitions.
    pub fn can_advance_to(&self, next: GateState) -> bool {
        use GateState::*;
        matches!(
            (self, next),
            (Pending, Verifying)
                | (Verifying, VerificationFailed)
                | (Verifying, Verified)
                | (Verified, Deciding)
                | (Deciding, Denied)
                | (Deciding, Allowed)
        )
    }
}

struct Evaluation {
    state: GateState,
}

impl Evaluation {
    fn start() -> Self {
        Self {
            state: GateState::Pending,
        }
    }

    fn advance(&mut self, next: GateState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal gate transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(from = ?self.state, to = ?next, "Gate transition");
        self.state = next;
    }
}

/// Shared gate configuration. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Gate {
    verifier: TokenVerifier,
    registry: Arc<RoleRegistry>,
    owner_param: Arc<str>,
}

impl Gate {
    pub fn new(verifier: TokenVerifier, registry: Arc<RoleRegistry>) -> Self {
        Self {
            verifier,
            registry,
            owner_param: Arc::from(DEFAULT_OWNER_PARAM),
        }
    }

    /// Read the resource owner from a differently named path parameter.
    pub fn with_owner_param(mut self, name: impl AsRef<str>) -> Self {
        self.owner_param = Arc::from(name.as_ref());
        self
    }

    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    /// Name of the path parameter read as the resource owner.
    pub fn owner_param(&self) -> &str {
        &self.owner_param
    }

    /// Layer for a route that needs every right in `rights`, unless the
    /// caller owns the resource.
    pub fn require<I, R>(&self, rights: I) -> GateLayer
    where
        I: IntoIterator<Item = R>,
        R: Into<Right>,
    {
        GateLayer {
            gate: self.clone(),
            required: rights.into_iter().map(Into::into).collect(),
        }
    }

    /// Layer for a route that only needs a verified caller.
    pub fn authenticated(&self) -> GateLayer {
        self.require(std::iter::empty::<Right>())
    }

    /// Run verification and the decision for one request head.
    pub async fn evaluate(&self, parts: &mut Parts, required: &[Right]) -> Decision {
        let mut evaluation = Evaluation::start();

        evaluation.advance(GateState::Verifying);
        let identity = match self.verifier.verify(parts).await {
            Ok(identity) => identity,
            Err(_) => {
                evaluation.advance(GateState::VerificationFailed);
                info!(
                    event = "gate_denied",
                    reason = %DenyReason::Unauthenticated,
                    path = %parts.uri.path(),
                    "Request denied"
                );
                return Decision::Deny(DenyReason::Unauthenticated);
            }
        };
        evaluation.advance(GateState::Verified);

        evaluation.advance(GateState::Deciding);
        let owner = owner_from_path(parts, &self.owner_param).await;
        let (user_id, role) = (identity.id, identity.role);
        let decision = decide(&self.registry, identity, required, owner);

        match &decision {
            Decision::Allow(identity) => {
                evaluation.advance(GateState::Allowed);
                debug!(
                    event = "gate_allowed",
                    user_id = %identity.id,
                    role = %identity.role,
                    "Request allowed"
                );
            }
            Decision::Deny(reason) => {
                evaluation.advance(GateState::Denied);
                info!(
                    event = "gate_denied",
                    user_id = %user_id,
                    reason = %reason,
                    path = %parts.uri.path(),
                    "Request denied"
                );
                let held = self.registry.rights_of(role);
                for missing in required.iter().filter(|right| !held.contains(*right)) {
                    debug!(
                        %role,
                        right = %missing,
                        granted_to = ?self.registry.roles_with(missing),
                        "Missing right"
                    );
                }
            }
        }

        decision
    }
}

/// Owner id from the matched path, if the route has one and it parses.
async fn owner_from_path(parts: &mut Parts, param: &str) -> Option<Uuid> {
    let params = RawPathParams::from_request_parts(parts, &()).await.ok()?;
    let (_, value) = params.iter().find(|(key, _)| *key == param)?;
    Uuid::parse_str(value).ok()
}

/// Gate bound to one route's requirement.
#[derive(Debug, Clone)]
pub struct GateLayer {
    gate: Gate,
    required: Arc<[Right]>,
}

impl GateLayer {
    pub fn required(&self) -> &[Right] {
        &self.required
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gate: self.gate.clone(),
            required: self.required.clone(),
        }
    }
}

/// Gate middleware service.
#[derive(Debug, Clone)]
pub struct GateService<S> {
    inner: S,
    gate: Gate,
    required: Arc<[Right]>,
}

impl<S> Service<Request<Body>> for GateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        let required = self.required.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            let decision: Result<Identity, ApiError> =
                gate.evaluate(&mut parts, &required).await.into_result();

            match decision {
                Ok(identity) => {
                    parts.extensions.insert::<Identity>(identity);
                    inner.call(Request::from_parts(parts, body)).await
                }
                // Rendered by ApiError's IntoResponse, like any handler error.
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}
