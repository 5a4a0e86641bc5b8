//! Shared application state.

use crate::{
    auth::{Gate, JwtStrategy, RoleRegistry, TokenVerifier},
    config::ServerConfig,
    directory::{IdentityDirectory, MemoryDirectory, MemoryLedger, PaymentLedger},
};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn IdentityDirectory>,
    pub ledger: Arc<dyn PaymentLedger>,
    pub gate: Gate,
}

impl AppState {
    /// Wire state from configuration.
    ///
    /// The role registry is built and checked here, so an incomplete roles
    /// table stops the server before it binds.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(config.registry().context("Invalid roles table")?);
        for (role, granted) in registry.to_table() {
            info!(%role, rights = granted.len(), "Registered role");
        }

        let directory: Arc<dyn IdentityDirectory> = match &config.directory.seed_path {
            Some(path) => Arc::new(MemoryDirectory::from_seed_file(path)?),
            None => Arc::new(MemoryDirectory::new()),
        };

        let strategy = JwtStrategy::new(&config.auth.jwt_secret, directory.clone())
            .with_cookie(config.auth.allow_cookie_token);
        let verifier = TokenVerifier::new(strategy);
        info!(
            strategy = verifier.strategy_name(),
            owner_param = %config.auth.owner_param,
            "Gate configured"
        );
        let gate = Gate::new(verifier, registry).with_owner_param(&config.auth.owner_param);

        Ok(Self::from_parts(directory, Arc::new(MemoryLedger::new()), gate))
    }

    /// Assemble state from ready-made parts.
    pub fn from_parts(
        directory: Arc<dyn IdentityDirectory>,
        ledger: Arc<dyn PaymentLedger>,
        gate: Gate,
    ) -> Self {
        Self {
            directory,
            ledger,
            gate,
        }
    }

    pub fn registry(&self) -> &Arc<RoleRegistry> {
        self.gate.registry()
    }
}
