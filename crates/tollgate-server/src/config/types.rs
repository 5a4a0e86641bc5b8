//! Server configuration types.

use crate::auth::{RegistryError, RoleRegistry, DEFAULT_OWNER_PARAM};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tollgate_common_log::LogSettings;

/// Main server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration.
    pub server: ServerBindConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LogSettings,
    /// Optional `role = [rights]` table replacing the built-in registry.
    #[serde(default)]
    pub roles: Option<BTreeMap<String, Vec<String>>>,
    /// User directory configuration.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl ServerConfig {
    /// Address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.server.socket_addr()
    }

    /// Build the role registry: the configured table if present, otherwise
    /// the built-in one.
    pub fn registry(&self) -> Result<RoleRegistry, RegistryError> {
        match &self.roles {
            Some(table) => RoleRegistry::from_table(table.clone()),
            None => Ok(RoleRegistry::builtin()),
        }
    }
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum request body size.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl ServerBindConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for access tokens.
    pub jwt_secret: String,
    /// Path parameter naming the resource owner.
    #[serde(default = "default_owner_param")]
    pub owner_param: String,
    /// Accept the `access_token` cookie when no bearer header is sent.
    #[serde(default)]
    pub allow_cookie_token: bool,
}

fn default_owner_param() -> String {
    DEFAULT_OWNER_PARAM.to_string()
}

/// User directory configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
    /// JSON file of users loaded at startup.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}
