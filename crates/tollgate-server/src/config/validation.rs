//! Configuration validation.

use super::types::ServerConfig;
use crate::auth::RegistryError;
use thiserror::Error;

/// Minimum HS256 secret length.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWT secret: must be at least {} characters", MIN_JWT_SECRET_LEN)]
    InvalidJwtSecret,

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Request timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Owner path parameter must not be empty")]
    EmptyOwnerParam,

    #[error("Invalid roles table: {0}")]
    InvalidRoles(#[from] RegistryError),
}

/// Validate server configuration, collecting every problem.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
        errors.push(ConfigError::InvalidJwtSecret);
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    } else if config.socket_addr().is_err() {
        errors.push(ConfigError::InvalidAddress(config.server.host.clone()));
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigError::InvalidTimeout);
    }

    if config.auth.owner_param.trim().is_empty() {
        errors.push(ConfigError::EmptyOwnerParam);
    }

    if let Err(err) = config.registry() {
        errors.push(err.into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
