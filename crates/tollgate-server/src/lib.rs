//! Tollgate API Server
//!
//! An HTTP API whose routes sit behind a request authorization gate.
//!
//! # Architecture
//!
//! - **Auth**: token verification, role registry, decision engine and the
//!   gate middleware that ties them together
//! - **Directory**: user, profile and payment storage behind async traits
//! - **Routes**: HTTP endpoints, each declaring the rights it requires
//! - **Error**: one error type rendered into the JSON error envelope
//!
//! A request to a protected route is verified, decided against the route's
//! required rights (or ownership of the `:userId` in its path), and then
//! either reaches its handler with an [`auth::Identity`] attached or is
//! answered with `401`/`403`.

#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod request;
pub mod response;
pub mod routes;
pub mod state;

pub use auth::{Gate, Identity, Right, Role, RoleRegistry};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Server builder for constructing and running the API server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let state = AppState::new(&config)?;
        Ok(Self { config, state })
    }

    /// Server over pre-built state, for embedding and tests.
    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone(), &self.config.server)
    }

    /// Run the server, binding to the configured address.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!(%addr, "Server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the server's socket address.
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        self.config
            .socket_addr()
            .context("Invalid server host or port")
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
