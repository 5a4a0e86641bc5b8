//! Credential verification.
//!
//! A [`Strategy`] verifies credentials in callback style: it receives the
//! request head and a [`Done`] handle and reports its verdict through
//! `done.call(error, identity, info)`, possibly later and from another task.
//! [`TokenVerifier`] turns that into a future that resolves exactly once.
//!
//! The first call on any clone of a `Done` settles the verdict. Every later
//! call is ignored, including calls that arrive after the request has been
//! dropped.

use super::identity::Identity;
use crate::error::ApiError;
use axum::http::request::Parts;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// The single failure the verifier reports.
///
/// Missing credentials, bad credentials, backend failures and unknown
/// subjects all look the same from here on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unauthenticated")]
pub struct Unauthenticated;

impl From<Unauthenticated> for ApiError {
    fn from(_: Unauthenticated) -> Self {
        ApiError::Unauthenticated
    }
}

/// Pluggable, callback-style credential check.
pub trait Strategy: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Inspect `request` and eventually invoke `done`.
    ///
    /// Implementations may call `done` synchronously or move it into a
    /// spawned task. Dropping every clone of `done` without calling it counts
    /// as a failure.
    fn authenticate(&self, request: &Parts, done: Done);
}

/// Why a strategy refused a request. Logged, never returned to callers.
enum Cause {
    Error(anyhow::Error),
    Info(String),
    NoIdentity,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "strategy error: {err:#}"),
            Self::Info(info) => write!(f, "strategy info: {info}"),
            Self::NoIdentity => f.write_str("no matching identity"),
        }
    }
}

enum Verdict {
    Verified(Identity),
    Rejected(Cause),
}

impl Verdict {
    // error or info present, or identity absent, means failure.
    fn from_callback(
        error: Option<anyhow::Error>,
        identity: Option<Identity>,
        info: Option<String>,
    ) -> Self {
        match (error, identity, info) {
            (None, Some(identity), None) => Self::Verified(identity),
            (Some(err), _, _) => Self::Rejected(Cause::Error(err)),
            (None, _, Some(info)) => Self::Rejected(Cause::Info(info)),
            (None, None, None) => Self::Rejected(Cause::NoIdentity),
        }
    }
}

/// Completion handle passed to a [`Strategy`].
#[derive(Clone)]
pub struct Done {
    slot: Arc<Mutex<Option<oneshot::Sender<Verdict>>>>,
}

impl Done {
    fn new(sender: oneshot::Sender<Verdict>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Report the verdict.
    ///
    /// Success requires `error` and `info` to be `None` and `identity` to be
    /// `Some`. Returns `true` if this call settled the verdict, `false` if an
    /// earlier call already had.
    pub fn call(
        &self,
        error: Option<anyhow::Error>,
        identity: Option<Identity>,
        info: Option<String>,
    ) -> bool {
        let Some(sender) = self.slot.lock().take() else {
            trace!("Ignoring repeated verification callback");
            return false;
        };

        // The receiver is gone when the request was dropped; nothing to do.
        let _ = sender.send(Verdict::from_callback(error, identity, info));
        true
    }

    /// Shorthand for `call(None, Some(identity), None)`.
    pub fn verified(&self, identity: Identity) -> bool {
        self.call(None, Some(identity), None)
    }

    /// Shorthand for `call(Some(error), None, None)`.
    pub fn error(&self, error: impl Into<anyhow::Error>) -> bool {
        self.call(Some(error.into()), None, None)
    }

    /// Shorthand for `call(None, None, Some(info))`.
    pub fn reject(&self, info: impl Into<String>) -> bool {
        self.call(None, None, Some(info.into()))
    }

    /// Whether a verdict has been reported.
    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Closure-backed strategy.
pub struct StrategyFn<F> {
    name: &'static str,
    f: F,
}

/// Wrap a closure as a [`Strategy`].
pub fn strategy_fn<F>(name: &'static str, f: F) -> StrategyFn<F>
where
    F: Fn(&Parts, Done) + Send + Sync + 'static,
{
    StrategyFn { name, f }
}

impl<F> Strategy for StrategyFn<F>
where
    F: Fn(&Parts, Done) + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn authenticate(&self, request: &Parts, done: Done) {
        (self.f)(request, done)
    }
}

/// Single-shot adapter over a [`Strategy`].
#[derive(Clone)]
pub struct TokenVerifier {
    strategy: Arc<dyn Strategy>,
}

impl TokenVerifier {
    pub fn new(strategy: impl Strategy) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    /// Name of the wrapped strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Verify the credential carried by `request`.
    ///
    /// Resolves to exactly one identity or exactly one `Unauthenticated`.
    pub async fn verify(&self, request: &Parts) -> Result<Identity, Unauthenticated> {
        let (sender, receiver) = oneshot::channel();
        self.strategy.authenticate(request, Done::new(sender));

        match receiver.await {
            Ok(Verdict::Verified(identity)) => Ok(identity),
            Ok(Verdict::Rejected(cause)) => {
                debug!(strategy = self.strategy.name(), %cause, "Credential rejected");
                Err(Unauthenticated)
            }
            Err(_) => {
                debug!(
                    strategy = self.strategy.name(),
                    "Strategy dropped its callback without a verdict"
                );
                Err(Unauthenticated)
            }
        }
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
