//! Delivery addresses and per-farm shipping fees.
//!
//! Each farm ships its own parcel, so fees are quoted per [`FarmGroup`].
//! All quotes are requested at once and land in a map keyed by farm id;
//! a failed quote only affects its own farm.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use agri_sdk::client::ClientError;
use agri_sdk::objects::{Address, CartSnapshot, FarmGroup, ShippingFeeQuery};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::StorefrontBackend;

/// Load the customer's delivery addresses.
pub async fn load_addresses<B: StorefrontBackend + ?Sized>(
    backend: &B,
) -> Result<Vec<Address>, ClientError> {
    backend.list_addresses().await
}

/// Fee quote for one farm group.
///
/// Entries handed out by this module are settled, so `is_loading` is only
/// ever set by a client rendering the map before it arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFeeEntry {
    pub farm_id: String,
    pub farm_name: String,
    pub fee: Decimal,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Shipping fees keyed by farm id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingFees(BTreeMap<String, ShippingFeeEntry>);

impl ShippingFees {
    pub fn get(&self, farm_id: &str) -> Option<&ShippingFeeEntry> {
        self.0.get(farm_id)
    }

    /// The fee charged for a farm's order; zero when unknown or failed.
    pub fn fee_for(&self, farm_id: &str) -> Decimal {
        self.0.get(farm_id).map_or(Decimal::ZERO, |e| e.fee)
    }

    pub fn total(&self) -> Decimal {
        self.0.values().map(|e| e.fee).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.0.values().any(|e| e.error.is_some())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ShippingFeeEntry> for ShippingFees {
    fn from_iter<I: IntoIterator<Item = ShippingFeeEntry>>(iter: I) -> Self {
        Self(iter.into_iter().map(|e| (e.farm_id.clone(), e)).collect())
    }
}

/// Quote every group's fee for `address_id`, concurrently.
///
/// The weight of a group is its total quantity. A failed quote becomes an
/// entry with a zero fee and the error message; it never fails the others.
pub async fn resolve_shipping_fees<B: StorefrontBackend + ?Sized>(
    backend: &B,
    groups: &[FarmGroup],
    address_id: i64,
) -> ShippingFees {
    let quotes = groups.iter().map(|group| async move {
        let query = ShippingFeeQuery {
            farm_id: group.farm_id.clone(),
            address_id,
            weight: group.total_quantity(),
        };
        let result = backend.shipping_fee(&query).await;
        let (fee, error) = match result {
            Ok(fee) => {
                debug!(farm_id = %group.farm_id, %fee, "Shipping fee quoted");
                (fee, None)
            }
            Err(e) => {
                warn!(farm_id = %group.farm_id, error = %e, "Shipping fee lookup failed");
                (Decimal::ZERO, Some(e.user_message()))
            }
        };
        ShippingFeeEntry {
            farm_id: group.farm_id.clone(),
            farm_name: group.farm_name.clone(),
            fee,
            is_loading: false,
            error,
        }
    });
    join_all(quotes).await.into_iter().collect()
}

/// What a set of fees was quoted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct QuoteKey {
    address_id: i64,
    cart_fingerprint: u64,
}

impl QuoteKey {
    fn new(snapshot: &CartSnapshot, address_id: i64) -> Self {
        let mut hasher = DefaultHasher::new();
        for group in &snapshot.groups {
            group.farm_id.hash(&mut hasher);
            for item in &group.items {
                (item.item_id, item.batch_id, item.quantity).hash(&mut hasher);
            }
        }
        Self {
            address_id,
            cart_fingerprint: hasher.finish(),
        }
    }
}

/// Keeps the fees of the current `(address, cart)` pair.
///
/// When either changes the whole map is re-quoted; entries quoted for a
/// previous pair are discarded, never merged. A map holding a failed quote
/// is re-quoted on the next refresh as well.
///
/// The cart fingerprint is only stable within one process.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ShippingFeeResolver {
    key: Option<QuoteKey>,
    fees: ShippingFees,
}

impl ShippingFeeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the fees up to date with `snapshot` and `address_id`.
    ///
    /// With no address selected there is nothing to quote and the map is
    /// cleared.
    pub async fn refresh<B: StorefrontBackend + ?Sized>(
        &mut self,
        backend: &B,
        snapshot: &CartSnapshot,
        address_id: Option<i64>,
    ) -> &ShippingFees {
        let Some(address_id) = address_id else {
            self.key = None;
            self.fees = ShippingFees::default();
            return &self.fees;
        };
        let key = QuoteKey::new(snapshot, address_id);
        if self.key != Some(key) || self.fees.has_errors() {
            self.fees = resolve_shipping_fees(backend, &snapshot.groups, address_id).await;
            self.key = Some(key);
        }
        &self.fees
    }
}
