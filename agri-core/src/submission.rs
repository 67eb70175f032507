//! Order submission engine.
//!
//! A checkout becomes one order per farm group. Orders are created one
//! group at a time. The first failure stops the run and no later group is
//! attempted. Orders that already exist are reported back and are not
//! cancelled.

use agri_sdk::client::ClientError;
use agri_sdk::objects::{
    Address, CartSnapshot, CreateOrderRequest, CustomerContact, OrderItemRequest,
    OrderItemResponse, OrderResponse, OrderStatus, OrderType, PaymentMethod, PaymentStatus,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backend::StorefrontBackend;
use crate::order_code::generate_order_code;
use crate::presenter::NextStep;
use crate::shipping::ShippingFees;

/// A created order, tagged with the farm group it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmissionRecord {
    pub order_id: i64,
    pub order_code: String,
    pub farm_id: String,
    pub farm_name: String,
    pub total_price: Decimal,
    pub shipping_fee: Decimal,
    pub customer: Option<CustomerContact>,
    pub address: Option<Address>,
    pub order_items: Vec<OrderItemResponse>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
}

impl OrderSubmissionRecord {
    fn new(order: OrderResponse, farm_id: &str, farm_name: &str) -> Self {
        Self {
            order_id: order.order_id,
            order_code: order.order_code,
            farm_id: farm_id.to_string(),
            farm_name: farm_name.to_string(),
            total_price: order.total_price,
            shipping_fee: order.shipping_fee,
            customer: order.customer,
            address: order.address,
            order_items: order.order_items,
            order_status: order.order_status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
        }
    }
}

/// Everything needed to turn a snapshot into orders.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionRequest<'a> {
    pub snapshot: &'a CartSnapshot,
    pub customer_id: i64,
    pub address_id: i64,
    pub fees: &'a ShippingFees,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Creating the order of one farm failed; earlier farms' orders exist.
    #[error("failed to create order for {farm_name} ({farm_id}): {source}")]
    FarmFailed {
        farm_id: String,
        farm_name: String,
        created: Vec<OrderSubmissionRecord>,
        #[source]
        source: ClientError,
    },

    /// The checkout was abandoned while orders were being created.
    #[error("checkout abandoned after {} order(s) were created", created.len())]
    Aborted { created: Vec<OrderSubmissionRecord> },

    #[error("no farm groups to submit")]
    Empty,
}

impl SubmissionError {
    pub fn next_step(&self) -> NextStep {
        NextStep::BackToCheckout
    }

    /// Orders that were created before the run stopped.
    pub fn created(&self) -> &[OrderSubmissionRecord] {
        match self {
            SubmissionError::FarmFailed { created, .. } | SubmissionError::Aborted { created } => {
                created
            }
            SubmissionError::Empty => &[],
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::FarmFailed {
                farm_name, source, ..
            } => format!(
                "Could not place the order for {farm_name}: {}",
                source.user_message()
            ),
            other => other.to_string(),
        }
    }
}

/// Fires when the customer leaves checkout.
#[derive(Debug)]
pub struct AbortHandle(watch::Sender<bool>);

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.0.send(true);
    }
}

/// Observed by the submission engine between and during order calls.
#[derive(Debug, Clone)]
pub struct AbortSignal(watch::Receiver<bool>);

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the signal fires. Pends forever if its handle is
    /// dropped without firing.
    pub async fn aborted(&mut self) {
        if self.0.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle(tx), AbortSignal(rx))
}

fn build_request(
    request: &SubmissionRequest<'_>,
    group: &agri_sdk::objects::FarmGroup,
    order_code: String,
) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id: request.customer_id,
        address_id: request.address_id,
        order_code,
        order_date: OffsetDateTime::now_utc(),
        order_type: OrderType::Order,
        shipping_fee: request.fees.fee_for(&group.farm_id),
        payment_method: request.payment_method,
        order_items: group
            .items
            .iter()
            .map(|item| OrderItemRequest {
                batch_id: item.batch_id,
                quantity: item.quantity,
            })
            .collect(),
    }
}

/// Create one order per non-empty farm group, strictly in sequence.
///
/// Group `i + 1` is only attempted after group `i` succeeded. If `abort`
/// fires, the engine stops waiting on the in-flight call and attempts no
/// further groups. The server may still create an order it had already
/// accepted.
pub async fn submit_orders<B: StorefrontBackend + ?Sized>(
    backend: &B,
    request: SubmissionRequest<'_>,
    abort: &mut AbortSignal,
) -> Result<Vec<OrderSubmissionRecord>, SubmissionError> {
    let groups: Vec<_> = request
        .snapshot
        .groups
        .iter()
        .filter(|g| !g.items.is_empty())
        .collect();
    if groups.is_empty() {
        return Err(SubmissionError::Empty);
    }

    let mut created = Vec::with_capacity(groups.len());
    for group in groups {
        if abort.is_aborted() {
            warn!(created = created.len(), "Checkout abandoned before next order");
            return Err(SubmissionError::Aborted { created });
        }

        let body = build_request(&request, group, generate_order_code());
        info!(
            farm_id = %group.farm_id,
            order_code = %body.order_code,
            items = body.order_items.len(),
            "Creating order"
        );

        let result = tokio::select! {
            biased;

            _ = abort.aborted() => {
                warn!(
                    farm_id = %group.farm_id,
                    order_code = %body.order_code,
                    "Checkout abandoned while an order was in flight"
                );
                return Err(SubmissionError::Aborted { created });
            }

            result = backend.create_order(&body) => result,
        };

        match result {
            Ok(order) => {
                info!(
                    farm_id = %group.farm_id,
                    order_id = order.order_id,
                    order_code = %order.order_code,
                    "Order created"
                );
                created.push(OrderSubmissionRecord::new(
                    order,
                    &group.farm_id,
                    &group.farm_name,
                ));
            }
            Err(source) => {
                error!(
                    farm_id = %group.farm_id,
                    error = %source,
                    created = created.len(),
                    "Order creation failed, aborting checkout"
                );
                return Err(SubmissionError::FarmFailed {
                    farm_id: group.farm_id.clone(),
                    farm_name: group.farm_name.clone(),
                    created,
                    source,
                });
            }
        }
    }

    Ok(created)
}
