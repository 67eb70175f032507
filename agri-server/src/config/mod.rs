//! Configuration module for agri-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    BackendConfig, CheckoutConfig, GatewayConfig, ServerConfig, SharedConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub gateway: GatewayConfig,
    pub checkout: CheckoutConfig,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig::new(self.server, self.backend, self.gateway, self.checkout)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
    backend_url_override: Option<Url>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(
        config_path: impl AsRef<Path>,
        listen_override: Option<SocketAddr>,
        backend_url_override: Option<Url>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            backend_url_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        self.process(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn process(&self, mut file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(base_url) = &self.backend_url_override {
            file_config.backend.base_url = base_url.clone();
        }

        validate(&file_config)?;

        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if !matches!(config.backend.base_url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "backend base_url must be http or https, got {}",
            config.backend.base_url
        )));
    }
    if config.backend.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "backend timeout_secs must be positive".to_string(),
        ));
    }
    if config.gateway.success_code.is_empty() {
        return Err(ConfigError::ValidationError(
            "gateway success_code must not be empty".to_string(),
        ));
    }
    if config.gateway.hash_secret.as_deref() == Some("") {
        return Err(ConfigError::ValidationError(
            "gateway hash_secret must not be empty; omit it to skip verification".to_string(),
        ));
    }
    if config.checkout.bundle_key.is_empty() {
        return Err(ConfigError::ValidationError(
            "checkout bundle_key must not be empty".to_string(),
        ));
    }
    if config.checkout.session_idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "checkout session_idle_timeout_secs must be positive".to_string(),
        ));
    }
    let cookie = &config.checkout.session_cookie;
    if cookie.is_empty()
        || !cookie
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::ValidationError(format!(
            "checkout session_cookie {cookie:?} is not a valid cookie name"
        )));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        backend: BackendConfig {
            base_url: file_config.backend.base_url,
            timeout: Duration::from_secs(file_config.backend.timeout_secs),
        },
        gateway: GatewayConfig {
            success_code: file_config.gateway.success_code,
            hash_secret: file_config
                .gateway
                .hash_secret
                .map(|s| s.into_bytes().into_boxed_slice()),
        },
        checkout: CheckoutConfig {
            bundle_key: file_config.checkout.bundle_key,
            session_cookie: file_config.checkout.session_cookie,
            session_idle_timeout: Duration::from_secs(
                file_config.checkout.session_idle_timeout_secs,
            ),
        },
    }
}
