//! Application state shared across all request handlers.

use agri_core::config::SharedConfig;
use agri_core::session::MemorySessionStore;
use agri_core::submission::{AbortHandle, AbortSignal, abort_pair};
use agri_sdk::client::StorefrontClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    /// Per-browser-session storage holding payment bundles.
    pub sessions: MemorySessionStore,
    /// Abort handles of in-flight order placements.
    pub placements: PlacementRegistry,
    /// Connection pool to the storefront backend, rebuilt on reload.
    http: Arc<RwLock<reqwest::Client>>,
}

impl AppState {
    /// Create a new AppState with the given configuration and HTTP client.
    pub fn new(config: SharedConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            sessions: MemorySessionStore::new(),
            placements: PlacementRegistry::default(),
            http: Arc::new(RwLock::new(http)),
        }
    }

    /// A storefront client acting as the customer behind `bearer_token`.
    pub async fn storefront(&self, bearer_token: Option<String>) -> StorefrontClient {
        let base_url = self.config.backend.read().await.base_url.clone();
        let http = self.http.read().await.clone();
        let client = StorefrontClient::new(base_url).with_http_client(http);
        match bearer_token {
            Some(token) => client.with_bearer_token(token),
            None => client,
        }
    }

    /// Swap the backend HTTP client (used during SIGHUP reload).
    pub async fn replace_http_client(&self, http: reqwest::Client) {
        *self.http.write().await = http;
    }
}

/// Build the HTTP client used for every backend call.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("agri-server/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// In-flight order placements, one per browser session.
///
/// Leaving the checkout page fires the session's handle so no further
/// farm orders are created.
#[derive(Clone, Default)]
pub struct PlacementRegistry {
    inner: Arc<Mutex<HashMap<String, (Uuid, AbortHandle)>>>,
}

impl PlacementRegistry {
    /// Register a placement for `session`, replacing any earlier one.
    pub async fn begin(&self, session: &str) -> (Uuid, AbortSignal) {
        let (handle, signal) = abort_pair();
        let id = Uuid::now_v7();
        self.inner
            .lock()
            .await
            .insert(session.to_string(), (id, handle));
        (id, signal)
    }

    /// Forget placement `id` once it has finished.
    pub async fn finish(&self, session: &str, id: Uuid) {
        let mut inner = self.inner.lock().await;
        if inner.get(session).is_some_and(|(current, _)| *current == id) {
            inner.remove(session);
        }
    }

    /// Fire the abort of the session's placement. Returns whether one was
    /// in flight.
    pub async fn abort(&self, session: &str) -> bool {
        match self.inner.lock().await.remove(session) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}
