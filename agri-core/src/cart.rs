//! Cart snapshot adapter.
//!
//! Produces the [`CartSnapshot`] a checkout works on: either the customer's
//! real cart, optionally narrowed to a selection of line items, or a
//! one-item cart synthesized for "Buy Now".

use agri_sdk::client::ClientError;
use agri_sdk::objects::{CartSnapshot, CustomerContact, FarmGroup, LineItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::backend::StorefrontBackend;
use crate::presenter::NextStep;

/// Farm id of the synthetic Buy-Now group.
pub const BUY_NOW_FARM_ID: &str = "unknown";
/// Prefix of the placeholder cart id of a Buy-Now checkout.
pub const BUY_NOW_CART_PREFIX: &str = "buynow-";

#[derive(Debug, Error)]
pub enum CartError {
    #[error("failed to load cart: {0}")]
    Fetch(#[source] ClientError),

    /// Nothing is left to check out after adaptation.
    #[error("no items selected")]
    NoItemsSelected,
}

impl CartError {
    pub fn next_step(&self) -> NextStep {
        NextStep::BackToCart
    }

    pub fn user_message(&self) -> String {
        match self {
            CartError::Fetch(e) => e.user_message(),
            CartError::NoItemsSelected => self.to_string(),
        }
    }
}

/// A single batch bought directly from its product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyNowPayload {
    pub batch_id: i64,
    pub quantity: u32,
    pub product_name: String,
    pub price: Decimal,
    #[serde(default)]
    pub units: String,
}

impl BuyNowPayload {
    /// Synthesize a one-group, one-item cart.
    ///
    /// The cart id is a local placeholder and never reaches the backend.
    pub fn into_snapshot(self, now: OffsetDateTime) -> CartSnapshot {
        let line_total = self.price * Decimal::from(self.quantity);
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        CartSnapshot {
            cart_id: format!("{BUY_NOW_CART_PREFIX}{millis}"),
            total_price: line_total,
            customer: CustomerContact::default(),
            groups: vec![FarmGroup {
                farm_id: BUY_NOW_FARM_ID.to_string(),
                farm_name: String::new(),
                items: vec![LineItem {
                    item_id: self.batch_id,
                    batch_id: self.batch_id,
                    batch_code: String::new(),
                    product_name: self.product_name,
                    unit_price: self.price,
                    quantity: self.quantity,
                    units: self.units,
                    line_total,
                    category_name: None,
                    season_name: None,
                    season_status: None,
                }],
            }],
        }
    }
}

/// Where a checkout's items come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutSource {
    #[default]
    Cart,
    BuyNow(BuyNowPayload),
}

/// Narrow `snapshot` to the line items in `selection`.
///
/// Line totals are recomputed, groups left empty are dropped and the cart
/// total becomes the sum of the surviving line totals.
pub fn filter_snapshot(snapshot: &CartSnapshot, selection: &[i64]) -> CartSnapshot {
    let groups: Vec<FarmGroup> = snapshot
        .groups
        .iter()
        .filter_map(|group| {
            let items: Vec<LineItem> = group
                .items
                .iter()
                .filter(|item| selection.contains(&item.item_id))
                .map(|item| LineItem {
                    line_total: item.unit_price * Decimal::from(item.quantity),
                    ..item.clone()
                })
                .collect();
            (!items.is_empty()).then(|| FarmGroup {
                items,
                ..group.clone()
            })
        })
        .collect();
    let total_price = groups.iter().map(FarmGroup::subtotal).sum();
    CartSnapshot {
        cart_id: snapshot.cart_id.clone(),
        total_price,
        customer: snapshot.customer.clone(),
        groups,
    }
}

/// Build the snapshot a checkout proceeds with.
///
/// `selection` only applies to the real cart. The result never has zero
/// groups: that case is [`CartError::NoItemsSelected`].
pub async fn load_snapshot<B: StorefrontBackend + ?Sized>(
    backend: &B,
    source: CheckoutSource,
    selection: Option<&[i64]>,
) -> Result<CartSnapshot, CartError> {
    let snapshot = match source {
        CheckoutSource::BuyNow(payload) => {
            debug!(batch_id = payload.batch_id, "Synthesizing Buy-Now cart");
            payload.into_snapshot(OffsetDateTime::now_utc())
        }
        CheckoutSource::Cart => {
            let mut cart = backend.get_cart().await.map_err(|e| {
                warn!(error = %e, "Failed to load cart for checkout");
                CartError::Fetch(e)
            })?;
            match selection {
                Some(selection) => filter_snapshot(&cart, selection),
                None => {
                    cart.groups.retain(|g| !g.items.is_empty());
                    cart
                }
            }
        }
    };

    if snapshot.is_empty() {
        return Err(CartError::NoItemsSelected);
    }
    Ok(snapshot)
}
