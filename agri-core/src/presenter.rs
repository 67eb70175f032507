//! Confirmation screens.
//!
//! The cash-on-delivery path is rendered straight from the submission
//! records; the bank-transfer path from the reconciler's verdict. Every
//! screen carries at least one action so the customer never hits a dead
//! end.

use agri_sdk::objects::{OrderResponse, OrderStatus, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::reconcile::ReconcileState;
use crate::submission::OrderSubmissionRecord;

/// Where the customer can go from a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    TryAgain,
    BackToCart,
    BackToCheckout,
    ViewOrders,
    ContinueShopping,
}

impl NextStep {
    pub fn label(&self) -> &'static str {
        match self {
            NextStep::TryAgain => "Try Again",
            NextStep::BackToCart => "Back to Cart",
            NextStep::BackToCheckout => "Back to Checkout",
            NextStep::ViewOrders => "View Orders",
            NextStep::ContinueShopping => "Continue Shopping",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            NextStep::TryAgain | NextStep::BackToCheckout => "/checkout",
            NextStep::BackToCart => "/cart",
            NextStep::ViewOrders => "/orders",
            NextStep::ContinueShopping => "/",
        }
    }

    pub fn action(self) -> Action {
        Action {
            step: self,
            label: self.label(),
            path: self.path(),
        }
    }
}

/// A button on a confirmation or error screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Action {
    pub step: NextStep,
    pub label: &'static str,
    pub path: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Processing,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: i64,
    pub order_code: String,
    pub farm_name: Option<String>,
    pub total_price: Decimal,
    pub shipping_fee: Decimal,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl From<&OrderSubmissionRecord> for OrderSummary {
    fn from(record: &OrderSubmissionRecord) -> Self {
        Self {
            order_id: record.order_id,
            order_code: record.order_code.clone(),
            farm_name: Some(record.farm_name.clone()),
            total_price: record.total_price,
            shipping_fee: record.shipping_fee,
            order_status: record.order_status,
            payment_status: record.payment_status,
        }
    }
}

impl From<&OrderResponse> for OrderSummary {
    fn from(order: &OrderResponse) -> Self {
        Self {
            order_id: order.order_id,
            order_code: order.order_code.clone(),
            farm_name: None,
            total_price: order.total_price,
            shipping_fee: order.shipping_fee,
            order_status: order.order_status,
            payment_status: order.payment_status,
        }
    }
}

/// What the confirmation screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub status: ConfirmationStatus,
    pub title: String,
    pub message: String,
    pub payment_method: Option<PaymentMethod>,
    pub orders: Vec<OrderSummary>,
    pub grand_total: Decimal,
    /// Order codes the gateway reported but that could not be loaded.
    pub unresolved: Vec<String>,
    pub actions: Vec<Action>,
}

impl Confirmation {
    /// The synchronous cash-on-delivery confirmation.
    pub fn cash_on_delivery(records: &[OrderSubmissionRecord]) -> Self {
        let orders: Vec<OrderSummary> = records.iter().map(OrderSummary::from).collect();
        Self {
            status: ConfirmationStatus::Success,
            title: "Order placed".to_string(),
            message: format!(
                "{} order(s) placed. Please pay the courier on delivery.",
                orders.len()
            ),
            payment_method: Some(PaymentMethod::CashOnDelivery),
            grand_total: grand_total(&orders),
            orders,
            unresolved: Vec::new(),
            actions: vec![NextStep::ViewOrders.action(), NextStep::ContinueShopping.action()],
        }
    }

    /// Render the reconciler's verdict for a bank-transfer checkout.
    pub fn from_reconcile(state: &ReconcileState) -> Self {
        match state {
            ReconcileState::Processing => Self {
                status: ConfirmationStatus::Processing,
                title: "Processing payment".to_string(),
                message: "Complete the payment in the VNPay tab; this page updates once the \
                          gateway reports back."
                    .to_string(),
                payment_method: Some(PaymentMethod::BankTransfer),
                orders: Vec::new(),
                grand_total: Decimal::ZERO,
                unresolved: Vec::new(),
                actions: vec![NextStep::BackToCheckout.action()],
            },
            ReconcileState::Success { orders, unresolved } => {
                let orders: Vec<OrderSummary> = orders.iter().map(OrderSummary::from).collect();
                Self {
                    status: ConfirmationStatus::Success,
                    title: "Payment successful".to_string(),
                    message: format!("{} order(s) paid through VNPay.", orders.len()),
                    payment_method: Some(PaymentMethod::BankTransfer),
                    grand_total: grand_total(&orders),
                    orders,
                    unresolved: unresolved.clone(),
                    actions: vec![
                        NextStep::ViewOrders.action(),
                        NextStep::ContinueShopping.action(),
                    ],
                }
            }
            ReconcileState::Failed { message, .. } => Self::failure(
                "Payment failed",
                message.clone(),
                &[NextStep::TryAgain, NextStep::BackToCart],
            ),
        }
    }

    /// A failure screen offering `steps`.
    pub fn failure(title: &str, message: String, steps: &[NextStep]) -> Self {
        Self {
            status: ConfirmationStatus::Failed,
            title: title.to_string(),
            message,
            payment_method: None,
            orders: Vec::new(),
            grand_total: Decimal::ZERO,
            unresolved: Vec::new(),
            actions: steps.iter().copied().map(NextStep::action).collect(),
        }
    }
}

fn grand_total(orders: &[OrderSummary]) -> Decimal {
    orders.iter().map(|o| o.total_price).sum()
}
