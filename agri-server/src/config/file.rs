//! TOML file configuration structures.
//!
//! These structs directly map to the `agri-config.toml` file format.

use agri_core::config::{DEFAULT_BUNDLE_KEY, DEFAULT_SESSION_COOKIE, DEFAULT_SESSION_IDLE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Storefront backend section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Root URL of the storefront REST API.
    pub base_url: Url,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

/// VNPay section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Merchant hash secret. Gateway returns are not verified when unset.
    #[serde(default)]
    pub hash_secret: Option<String>,
    #[serde(default = "default_success_code")]
    pub success_code: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            hash_secret: None,
            success_code: default_success_code(),
        }
    }
}

fn default_success_code() -> String {
    agri_sdk::vnpay::SUCCESS_CODE.to_string()
}

/// Checkout section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Session-storage key of the payment bundle.
    #[serde(default = "default_bundle_key")]
    pub bundle_key: String,
    /// Name of the browser session cookie.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Seconds a browser session may stay idle before it is dropped.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            bundle_key: default_bundle_key(),
            session_cookie: default_session_cookie(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
        }
    }
}

fn default_bundle_key() -> String {
    DEFAULT_BUNDLE_KEY.to_string()
}

fn default_session_cookie() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

fn default_session_idle_timeout_secs() -> u64 {
    DEFAULT_SESSION_IDLE_TIMEOUT.as_secs()
}
