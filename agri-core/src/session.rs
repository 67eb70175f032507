//! Session-scoped storage and the payment bundle kept in it.
//!
//! The bundle is the hand-off between the tab that started a bank transfer
//! and the page the gateway redirects back to. Bundles are keyed by a
//! per-checkout transaction id. A pointer under the bare key names the
//! session's latest transaction, and reading a bundle removes it together
//! with every older bundle of the session.
//!
//! Once a return has been reconciled its verdict is kept next to the
//! bundles, so the tab still showing the processing screen can pick it up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::order_code::{join_bundle, split_order_info};
use crate::reconcile::ReconcileState;

/// String storage scoped to one browser session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session: &str, key: &str) -> Option<String>;

    async fn set(&self, session: &str, key: &str, value: String);

    /// Remove a value, returning what was stored.
    async fn remove(&self, session: &str, key: &str) -> Option<String>;

    /// Every key of `session` starting with `prefix`.
    async fn keys_with_prefix(&self, session: &str, prefix: &str) -> Vec<String>;
}

#[derive(Debug)]
struct SessionEntry {
    values: HashMap<String, String>,
    touched: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            touched: Instant::now(),
        }
    }
}

/// Process-local [`SessionStore`].
///
/// Every read or write refreshes the session. Sessions left alone for
/// longer than the idle timeout are dropped by [`evict_idle`].
///
/// [`evict_idle`]: MemorySessionStore::evict_idle
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every session idle for at least `idle`. Returns how many went.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.touched.elapsed() < idle);
        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session: &str, key: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session)?;
        entry.touched = Instant::now();
        entry.values.get(key).cloned()
    }

    async fn set(&self, session: &str, key: &str, value: String) {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session.to_string())
            .or_insert_with(SessionEntry::new);
        entry.touched = Instant::now();
        entry.values.insert(key.to_string(), value);
    }

    async fn remove(&self, session: &str, key: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session)?;
        entry.touched = Instant::now();
        let removed = entry.values.remove(key);
        if entry.values.is_empty() {
            sessions.remove(session);
        }
        removed
    }

    async fn keys_with_prefix(&self, session: &str, prefix: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .get(session)
            .map(|entry| {
                entry
                    .values
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The order codes of one bank-transfer checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentBundle {
    pub transaction_id: Uuid,
    pub order_codes: Vec<String>,
}

impl PaymentBundle {
    pub fn new(transaction_id: Uuid, order_codes: Vec<String>) -> Self {
        Self {
            transaction_id,
            order_codes,
        }
    }

    /// The comma-joined form that is stored and handed to the gateway.
    pub fn joined(&self) -> String {
        join_bundle(&self.order_codes)
    }
}

/// A reconciled verdict as kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredVerdict {
    transaction_id: Option<Uuid>,
    state: ReconcileState,
}

/// Reads and writes payment bundles for one session.
///
/// Transaction ids are UUIDv7, so comparing two ids compares the time the
/// checkouts started.
pub struct PaymentBundleStore<'a, S: SessionStore + ?Sized> {
    store: &'a S,
    session: &'a str,
    key: &'a str,
}

impl<'a, S: SessionStore + ?Sized> PaymentBundleStore<'a, S> {
    pub fn new(store: &'a S, session: &'a str, key: &'a str) -> Self {
        Self {
            store,
            session,
            key,
        }
    }

    fn scoped_prefix(&self) -> String {
        format!("{}:", self.key)
    }

    fn scoped_key(&self, transaction_id: Uuid) -> String {
        format!("{}:{}", self.key, transaction_id)
    }

    fn verdict_key(&self, transaction_id: Option<Uuid>) -> String {
        match transaction_id {
            Some(id) => format!("{}#verdict:{}", self.key, id),
            None => format!("{}#verdict", self.key),
        }
    }

    /// Store `bundle` and make it the session's latest.
    ///
    /// An earlier bundle of the same session stays retrievable by its own
    /// transaction id. The session's latest verdict is cleared so a new
    /// processing screen starts out processing.
    pub async fn save(&self, bundle: &PaymentBundle) {
        self.store
            .set(
                self.session,
                &self.scoped_key(bundle.transaction_id),
                bundle.joined(),
            )
            .await;
        self.store
            .set(self.session, self.key, bundle.transaction_id.to_string())
            .await;
        self.store
            .remove(self.session, &self.verdict_key(None))
            .await;
        debug!(
            transaction_id = %bundle.transaction_id,
            orders = bundle.order_codes.len(),
            "Payment bundle saved"
        );
    }

    /// Remove and return the bundle of `transaction_id`.
    ///
    /// Bundles of checkouts started before it are removed too.
    pub async fn take(&self, transaction_id: Uuid) -> Option<PaymentBundle> {
        let joined = self
            .store
            .remove(self.session, &self.scoped_key(transaction_id))
            .await?;

        let stale: Vec<Uuid> = self
            .stored_ids()
            .await
            .into_iter()
            .filter(|id| *id < transaction_id)
            .collect();
        for id in &stale {
            self.store.remove(self.session, &self.scoped_key(*id)).await;
        }
        if !stale.is_empty() {
            debug!(%transaction_id, dropped = stale.len(), "Dropped stale payment bundles");
        }

        if self
            .latest_id()
            .await
            .is_some_and(|latest| latest <= transaction_id)
        {
            self.store.remove(self.session, self.key).await;
        }
        Some(PaymentBundle::new(transaction_id, split_order_info(&joined)))
    }

    /// Remove and return the session's latest bundle.
    pub async fn take_latest(&self) -> Option<PaymentBundle> {
        let transaction_id = self.latest_id().await?;
        self.take(transaction_id).await
    }

    /// Remove and return the bundle a gateway return belongs to.
    ///
    /// That is the bundle sharing an order code with `order_codes`, or the
    /// latest one when none does.
    pub async fn take_for_return(&self, order_codes: &[String]) -> Option<PaymentBundle> {
        if !order_codes.is_empty() {
            for id in self.stored_ids().await {
                let Some(joined) = self.store.get(self.session, &self.scoped_key(id)).await else {
                    continue;
                };
                if split_order_info(&joined)
                    .iter()
                    .any(|code| order_codes.contains(code))
                {
                    return self.take(id).await;
                }
            }
        }
        self.take_latest().await
    }

    /// Keep the verdict of a reconciled return.
    ///
    /// It becomes the session's latest verdict and, when the return matched
    /// a bundle, the verdict of that transaction.
    pub async fn record_verdict(&self, transaction_id: Option<Uuid>, state: &ReconcileState) {
        let stored = StoredVerdict {
            transaction_id,
            state: state.clone(),
        };
        let json = match serde_json::to_string(&stored) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode payment verdict");
                return;
            }
        };
        if transaction_id.is_some() {
            self.store
                .set(self.session, &self.verdict_key(transaction_id), json.clone())
                .await;
        }
        self.store
            .set(self.session, &self.verdict_key(None), json)
            .await;
    }

    /// The verdict of `transaction_id`, or the session's latest verdict.
    pub async fn verdict(&self, transaction_id: Option<Uuid>) -> Option<ReconcileState> {
        let json = self
            .store
            .get(self.session, &self.verdict_key(transaction_id))
            .await?;
        match serde_json::from_str::<StoredVerdict>(&json) {
            Ok(stored) => Some(stored.state),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable payment verdict");
                None
            }
        }
    }

    async fn stored_ids(&self) -> Vec<Uuid> {
        let prefix = self.scoped_prefix();
        let mut ids: Vec<Uuid> = self
            .store
            .keys_with_prefix(self.session, &prefix)
            .await
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect();
        ids.sort_unstable();
        ids
    }

    async fn latest_id(&self) -> Option<Uuid> {
        self.store
            .get(self.session, self.key)
            .await
            .and_then(|id| Uuid::parse_str(&id).ok())
    }
}
