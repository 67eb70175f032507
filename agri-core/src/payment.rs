//! Payment initiation for bank-transfer checkouts.
//!
//! One gateway URL pays for every order of a checkout. The order codes are
//! parked in session storage so the return page can tell which orders to
//! reconcile; the URL itself is handed back to be opened in a new tab.

use agri_sdk::client::ClientError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use crate::backend::StorefrontBackend;
use crate::presenter::NextStep;
use crate::session::{PaymentBundle, PaymentBundleStore, SessionStore};
use crate::submission::OrderSubmissionRecord;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway URL could not be obtained. The orders stay created and
    /// unpaid.
    #[error("could not start payment: {source}")]
    Gateway {
        orders: Vec<OrderSubmissionRecord>,
        #[source]
        source: ClientError,
    },

    #[error("no orders to pay for")]
    NoOrders,
}

impl PaymentError {
    pub fn next_step(&self) -> NextStep {
        NextStep::BackToCheckout
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Gateway { orders, source } => format!(
                "Could not start the VNPay payment ({}). {} order(s) were created and are \
                 awaiting payment.",
                source.user_message(),
                orders.len()
            ),
            PaymentError::NoOrders => self.to_string(),
        }
    }
}

/// What the browser needs to continue a bank-transfer checkout.
///
/// The gateway URL is opened in a new tab without waiting on it. The
/// current tab moves to the processing screen with the same order codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandoff {
    pub transaction_id: Uuid,
    pub payment_url: Url,
    pub order_codes: String,
    pub orders: Vec<OrderSubmissionRecord>,
}

/// Request the gateway URL for `orders` and park their codes.
///
/// The bundle is only saved once the gateway URL is known.
pub async fn initiate_payment<B, S>(
    backend: &B,
    bundles: &PaymentBundleStore<'_, S>,
    orders: Vec<OrderSubmissionRecord>,
) -> Result<PaymentHandoff, PaymentError>
where
    B: StorefrontBackend + ?Sized,
    S: SessionStore + ?Sized,
{
    if orders.is_empty() {
        return Err(PaymentError::NoOrders);
    }

    let order_ids: Vec<i64> = orders.iter().map(|o| o.order_id).collect();
    let payment_url = match backend.create_payment_url(&order_ids).await {
        Ok(url) => url,
        Err(source) => {
            error!(
                ?order_ids,
                error = %source,
                "Payment initiation failed; orders remain unpaid"
            );
            return Err(PaymentError::Gateway { orders, source });
        }
    };

    let bundle = PaymentBundle::new(
        Uuid::now_v7(),
        orders.iter().map(|o| o.order_code.clone()).collect(),
    );
    bundles.save(&bundle).await;

    info!(
        transaction_id = %bundle.transaction_id,
        orders = orders.len(),
        "Payment initiated"
    );

    Ok(PaymentHandoff {
        transaction_id: bundle.transaction_id,
        payment_url,
        order_codes: bundle.joined(),
        orders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BUNDLE_KEY;
    use crate::session::MemorySessionStore;
    use crate::shipping::ShippingFees;
    use crate::submission::{AbortSignal, SubmissionRequest, submit_orders};
    use crate::testing::{Call, MockBackend, farm, item, sample_cart};
    use agri_sdk::objects::PaymentMethod;

    async fn two_orders(backend: &MockBackend) -> Vec<OrderSubmissionRecord> {
        let cart = sample_cart(vec![
            farm("f1", vec![item(1, 11, 10_000, 1)]),
            farm("f2", vec![item(2, 12, 10_000, 1)]),
        ]);
        let fees = ShippingFees::default();
        submit_orders(
            backend,
            SubmissionRequest {
                snapshot: &cart,
                customer_id: 1,
                address_id: 1,
                fees: &fees,
                payment_method: PaymentMethod::BankTransfer,
            },
            &mut AbortSignal::never(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_handoff_saves_bundle() {
        let backend = MockBackend::new().with_payment_url("https://sandbox.vnpayment.vn/pay?x=1");
        let store = MemorySessionStore::new();
        let bundles = PaymentBundleStore::new(&store, "s1", DEFAULT_BUNDLE_KEY);
        let orders = two_orders(&backend).await;
        let codes: Vec<String> = orders.iter().map(|o| o.order_code.clone()).collect();

        let handoff = initiate_payment(&backend, &bundles, orders).await.unwrap();

        assert_eq!(handoff.order_codes, codes.join(","));
        assert_eq!(handoff.payment_url.host_str(), Some("sandbox.vnpayment.vn"));
        assert!(backend.calls().contains(&Call::CreatePaymentUrl(vec![1, 2])));

        let stored = bundles.take_latest().await.unwrap();
        assert_eq!(stored.transaction_id, handoff.transaction_id);
        assert_eq!(stored.order_codes, codes);
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_orders_and_stores_nothing() {
        let backend = MockBackend::new();
        let store = MemorySessionStore::new();
        let bundles = PaymentBundleStore::new(&store, "s1", DEFAULT_BUNDLE_KEY);
        let orders = two_orders(&backend).await;

        let err = initiate_payment(&backend, &bundles, orders).await.unwrap_err();

        let PaymentError::Gateway { orders, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(orders.len(), 2);
        assert_eq!(err.next_step(), NextStep::BackToCheckout);
        assert!(bundles.take_latest().await.is_none());
    }
}
