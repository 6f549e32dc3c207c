//! Configuration system.
//!
//! Layered configuration: defaults, then an optional config file, then
//! `SKEIN_`-prefixed environment variables. Every field carries a serde
//! default so a missing file yields a working setup.

use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkeinConfig {
    /// Send/receive pipeline settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Remote object-server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Send/receive pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on in-flight transport operations per stage.
    #[serde(default = "default_transport_concurrency")]
    pub transport_concurrency: usize,
}

fn default_transport_concurrency() -> usize {
    8
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transport_concurrency: default_transport_concurrency(),
        }
    }
}

/// Remote object-server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the object server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token, absent for anonymous access.
    #[serde(default)]
    pub token: Option<String>,

    /// Connection establishment timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout, sized for large object payloads.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SkeinConfig {
    /// Load configuration from an optional file plus environment overrides.
    ///
    /// Override order, lowest to highest: serde defaults, the file at `path`
    /// (skipped when absent), then `SKEIN_`-prefixed environment variables
    /// with `__` as the section separator (`SKEIN_SERVER__BASE_URL`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config: Self = builder
            .add_source(Environment::with_prefix("SKEIN").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.transport_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "sync.transport_concurrency must be at least 1".to_string(),
            ));
        }
        if self.server.base_url.is_empty() {
            return Err(ConfigError::Invalid(
                "server.base_url cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
