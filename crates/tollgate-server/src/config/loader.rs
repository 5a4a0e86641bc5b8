//! Configuration loading utilities.

use super::types::ServerConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming a config file.
pub const CONFIG_PATH_ENV: &str = "TOLLGATE_CONFIG";

/// Load configuration from defaults, an optional file and the environment,
/// in that order of precedence (later wins).
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "TOLLGATE".to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration.
    pub fn load(&self) -> Result<ServerConfig> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("defaults.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if !Path::new(path).exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            info!(path = %path.display(), "Loading config file");
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration, taking the file path from `explicit` or
/// `TOLLGATE_CONFIG`.
pub fn load_config(explicit: Option<&Path>) -> Result<ServerConfig> {
    let mut loader = ConfigLoader::new();

    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
    if let Some(path) = path {
        loader = loader.with_config_path(path);
    }

    loader.load()
}
