//! Runtime configuration shared between the flow and the server.
//!
//! The file format and loading live in the server crate; these are the
//! validated values.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// Default session-storage key of the payment bundle.
pub const DEFAULT_BUNDLE_KEY: &str = "vnp_orderCodes";
/// Default name of the browser session cookie.
pub const DEFAULT_SESSION_COOKIE: &str = "agri_session";
/// Default idle time after which a browser session is dropped.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Server configuration with runtime values.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address and port to listen on.
    pub listen: SocketAddr,
}

/// Where the storefront backend lives and how long to wait on it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

/// VNPay return handling.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Response code meaning "paid".
    pub success_code: String,
    /// HMAC-SHA512 secret for `vnp_SecureHash`. Returns are not verified
    /// when unset.
    pub hash_secret: Option<Box<[u8]>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            success_code: agri_sdk::vnpay::SUCCESS_CODE.to_string(),
            hash_secret: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Session-storage key under which payment bundles are kept.
    pub bundle_key: String,
    pub session_cookie: String,
    /// Sessions untouched for this long are evicted.
    pub session_idle_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            bundle_key: DEFAULT_BUNDLE_KEY.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }
}

/// Shared configuration state with separate locks for each section.
///
/// This allows independent access to different configuration sections
/// without blocking other readers/writers.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub backend: Arc<RwLock<BackendConfig>>,
    pub gateway: Arc<RwLock<GatewayConfig>>,
    pub checkout: Arc<RwLock<CheckoutConfig>>,
}

impl SharedConfig {
    pub fn new(
        server: ServerConfig,
        backend: BackendConfig,
        gateway: GatewayConfig,
        checkout: CheckoutConfig,
    ) -> Self {
        Self {
            server: Arc::new(RwLock::new(server)),
            backend: Arc::new(RwLock::new(backend)),
            gateway: Arc::new(RwLock::new(gateway)),
            checkout: Arc::new(RwLock::new(checkout)),
        }
    }

    /// Update every section in sequence.
    pub async fn update_all(
        &self,
        server: ServerConfig,
        backend: BackendConfig,
        gateway: GatewayConfig,
        checkout: CheckoutConfig,
    ) {
        *self.server.write().await = server;
        *self.backend.write().await = backend;
        *self.gateway.write().await = gateway;
        *self.checkout.write().await = checkout;
    }
}
