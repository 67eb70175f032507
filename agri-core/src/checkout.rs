//! The checkout flow end to end.
//!
//! [`CheckoutFlow`] ties the pieces together for one browser session:
//! cart adaptation, shipping fees, order submission, and then either the
//! cash-on-delivery confirmation or the hand-off to VNPay. The gateway
//! return lands in [`CheckoutFlow::handle_gateway_return`].

use agri_sdk::client::ClientError;
use agri_sdk::objects::{Address, CartSnapshot, PaymentMethod};
use agri_sdk::vnpay::GatewayCallbackParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::StorefrontBackend;
use crate::cart::{CartError, CheckoutSource, load_snapshot};
use crate::config::{CheckoutConfig, GatewayConfig};
use crate::payment::{PaymentError, PaymentHandoff, initiate_payment};
use crate::order_code::split_order_info;
use crate::presenter::{Confirmation, NextStep};
use crate::reconcile::{ReconcileState, Reconciler};
use crate::session::{PaymentBundleStore, SessionStore};
use crate::shipping::{ShippingFeeResolver, ShippingFees, load_addresses};
use crate::submission::{AbortSignal, SubmissionError, SubmissionRequest, submit_orders};

/// What the checkout page shows before the customer places the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPreview {
    pub snapshot: CartSnapshot,
    pub addresses: Vec<Address>,
    /// The address the fees were quoted for, if any.
    pub selected_address_id: Option<i64>,
    pub fees: ShippingFees,
}

impl CheckoutPreview {
    /// Items plus every quoted shipping fee.
    pub fn grand_total(&self) -> rust_decimal::Decimal {
        self.snapshot.total_price + self.fees.total()
    }
}

/// A request to place the order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer_id: i64,
    pub address_id: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub source: CheckoutSource,
    /// Line item ids chosen on the cart page. Every item when absent.
    #[serde(default)]
    pub selection: Option<Vec<i64>>,
}

/// Result of placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Cash on delivery: the orders are placed and nothing else happens.
    Confirmed(Confirmation),
    /// Bank transfer: open the gateway URL and wait for the return.
    AwaitingPayment(PaymentHandoff),
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("failed to load addresses: {0}")]
    Addresses(#[source] ClientError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl CheckoutError {
    pub fn next_step(&self) -> NextStep {
        match self {
            CheckoutError::Cart(e) => e.next_step(),
            CheckoutError::Addresses(_) => NextStep::BackToCart,
            CheckoutError::Submission(e) => e.next_step(),
            CheckoutError::Payment(e) => e.next_step(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Cart(e) => e.user_message(),
            CheckoutError::Addresses(e) => e.user_message(),
            CheckoutError::Submission(e) => e.user_message(),
            CheckoutError::Payment(e) => e.user_message(),
        }
    }

    /// The error screen for this failure.
    pub fn confirmation(&self) -> Confirmation {
        let title = match self {
            CheckoutError::Cart(_) | CheckoutError::Addresses(_) => "Checkout unavailable",
            CheckoutError::Submission(_) => "Order failed",
            CheckoutError::Payment(_) => "Payment could not be started",
        };
        Confirmation::failure(title, self.user_message(), &[self.next_step()])
    }
}

/// Session key of the shipping quotes last shown on the checkout page.
pub const SHIPPING_QUOTE_KEY: &str = "shipping_quote";

/// The checkout flow of one browser session.
pub struct CheckoutFlow<'a, B: ?Sized, S: ?Sized> {
    backend: &'a B,
    sessions: &'a S,
    session: &'a str,
    checkout: &'a CheckoutConfig,
    gateway: &'a GatewayConfig,
}

impl<'a, B, S> CheckoutFlow<'a, B, S>
where
    B: StorefrontBackend + ?Sized,
    S: SessionStore + ?Sized,
{
    pub fn new(
        backend: &'a B,
        sessions: &'a S,
        session: &'a str,
        checkout: &'a CheckoutConfig,
        gateway: &'a GatewayConfig,
    ) -> Self {
        Self {
            backend,
            sessions,
            session,
            checkout,
            gateway,
        }
    }

    fn bundles(&self) -> PaymentBundleStore<'a, S> {
        PaymentBundleStore::new(self.sessions, self.session, &self.checkout.bundle_key)
    }

    async fn load_quotes(&self) -> ShippingFeeResolver {
        let Some(json) = self.sessions.get(self.session, SHIPPING_QUOTE_KEY).await else {
            return ShippingFeeResolver::new();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable shipping quotes");
            ShippingFeeResolver::new()
        })
    }

    async fn store_quotes(&self, quotes: &ShippingFeeResolver) {
        match serde_json::to_string(quotes) {
            Ok(json) => {
                self.sessions
                    .set(self.session, SHIPPING_QUOTE_KEY, json)
                    .await
            }
            Err(e) => warn!(error = %e, "Failed to encode shipping quotes"),
        }
    }

    /// Load everything the checkout page needs.
    ///
    /// Fees are quoted for `address_id`, or for the default address when
    /// none is given. With no address at all the fee map stays empty. The
    /// quotes are kept in the session and only requested again once the
    /// address or the cart changes.
    pub async fn prepare(
        &self,
        source: CheckoutSource,
        selection: Option<&[i64]>,
        address_id: Option<i64>,
    ) -> Result<CheckoutPreview, CheckoutError> {
        let snapshot = load_snapshot(self.backend, source, selection).await?;
        let addresses = load_addresses(self.backend)
            .await
            .map_err(CheckoutError::Addresses)?;

        let selected_address_id = address_id.or_else(|| {
            addresses
                .iter()
                .find(|a| a.is_default)
                .or_else(|| addresses.first())
                .map(|a| a.address_id)
        });
        let mut quotes = self.load_quotes().await;
        let fees = quotes
            .refresh(self.backend, &snapshot, selected_address_id)
            .await
            .clone();
        self.store_quotes(&quotes).await;

        Ok(CheckoutPreview {
            snapshot,
            addresses,
            selected_address_id,
            fees,
        })
    }

    /// Place the order.
    ///
    /// The snapshot is taken fresh. Fees come from the quotes shown on the
    /// checkout page when they still match the cart and address, and are
    /// quoted again otherwise. One order is then created per farm. A failed
    /// fee quote counts as a zero fee.
    pub async fn place(
        &self,
        request: CheckoutRequest,
        abort: &mut AbortSignal,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let snapshot =
            load_snapshot(self.backend, request.source, request.selection.as_deref()).await?;
        let mut quotes = self.load_quotes().await;
        let fees = quotes
            .refresh(self.backend, &snapshot, Some(request.address_id))
            .await
            .clone();
        if fees.has_errors() {
            warn!(
                address_id = request.address_id,
                "Placing order with failed shipping quotes charged as zero"
            );
        }

        let records = submit_orders(
            self.backend,
            SubmissionRequest {
                snapshot: &snapshot,
                customer_id: request.customer_id,
                address_id: request.address_id,
                fees: &fees,
                payment_method: request.payment_method,
            },
            abort,
        )
        .await?;
        self.sessions.remove(self.session, SHIPPING_QUOTE_KEY).await;

        if !request.payment_method.requires_gateway() {
            info!(orders = records.len(), "Cash-on-delivery checkout complete");
            return Ok(CheckoutOutcome::Confirmed(Confirmation::cash_on_delivery(
                &records,
            )));
        }

        let handoff = initiate_payment(self.backend, &self.bundles(), records).await?;
        Ok(CheckoutOutcome::AwaitingPayment(handoff))
    }

    /// Reconcile the gateway's return redirect.
    ///
    /// A return with gateway parameters consumes the payment bundle it
    /// belongs to, and a final verdict is kept for the tab still showing
    /// the processing screen. Without parameters this is that tab's poll.
    pub async fn handle_gateway_return(&self, params: &GatewayCallbackParams) -> ReconcileState {
        if !params.is_present() {
            return self.payment_status(None).await;
        }

        let reconciler = Reconciler::new(self.backend, &self.gateway.success_code)
            .with_hash_secret(self.gateway.hash_secret.as_deref());
        let order_codes = params
            .order_info
            .as_deref()
            .map(split_order_info)
            .unwrap_or_default();
        let bundles = self.bundles();
        let stored = bundles.take_for_return(&order_codes).await;

        let verdict = reconciler.reconcile(params, stored.as_ref()).await;
        if verdict.is_terminal() {
            bundles
                .record_verdict(stored.map(|b| b.transaction_id), &verdict)
                .await;
        }
        verdict
    }

    /// The processing screen's view of a payment.
    ///
    /// The verdict of `transaction_id` (or the session's latest verdict)
    /// once the gateway return has been reconciled, processing until then.
    pub async fn payment_status(&self, transaction_id: Option<Uuid>) -> ReconcileState {
        self.bundles()
            .verdict(transaction_id)
            .await
            .unwrap_or(ReconcileState::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BUNDLE_KEY;
    use crate::presenter::ConfirmationStatus;
    use crate::session::MemorySessionStore;
    use crate::testing::{Call, MockBackend, farm, item, sample_cart};
    use agri_sdk::vnpay::{ORDER_INFO_PARAM, RESPONSE_CODE_PARAM};
    use rust_decimal::Decimal;

    fn request(payment_method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: 7,
            address_id: 1,
            payment_method,
            source: CheckoutSource::Cart,
            selection: None,
        }
    }

    #[tokio::test]
    async fn test_cash_on_delivery_end_to_end() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![farm(
                "f1",
                vec![item(1, 11, 20_000, 2), item(2, 12, 5_000, 1)],
            )]))
            .with_address(1)
            .with_fee("f1", 15_000);
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);

        let outcome = flow
            .place(request(PaymentMethod::CashOnDelivery), &mut AbortSignal::never())
            .await
            .unwrap();

        let CheckoutOutcome::Confirmed(view) = outcome else {
            panic!("expected a confirmation, got {outcome:?}");
        };
        assert_eq!(view.status, ConfirmationStatus::Success);
        assert_eq!(view.orders.len(), 1);
        assert_eq!(view.orders[0].shipping_fee, Decimal::from(15_000));
        assert!(
            !backend
                .calls()
                .iter()
                .any(|c| matches!(c, Call::CreatePaymentUrl(_))),
            "cash on delivery never touches the gateway"
        );
        assert!(sessions.get("s1", DEFAULT_BUNDLE_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_bank_transfer_success_end_to_end() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![
                farm("f1", vec![item(1, 11, 20_000, 2)]),
                farm("f2", vec![item(2, 12, 5_000, 1)]),
            ]))
            .with_address(1)
            .with_fee("f1", 15_000)
            .with_fee("f2", 20_000)
            .with_payment_url("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?vnp_TxnRef=1");
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);

        let outcome = flow
            .place(request(PaymentMethod::BankTransfer), &mut AbortSignal::never())
            .await
            .unwrap();
        let CheckoutOutcome::AwaitingPayment(handoff) = outcome else {
            panic!("expected a payment hand-off, got {outcome:?}");
        };
        assert_eq!(handoff.orders.len(), 2);
        assert_eq!(handoff.order_codes, backend.created_codes().join(","));

        // The processing screen polls before the gateway reports back.
        let state = flow
            .handle_gateway_return(&GatewayCallbackParams::default())
            .await;
        assert_eq!(state, ReconcileState::Processing);

        let params = GatewayCallbackParams::from_pairs([
            (RESPONSE_CODE_PARAM, "00"),
            (ORDER_INFO_PARAM, handoff.order_codes.as_str()),
        ]);
        let state = flow.handle_gateway_return(&params).await;
        let ReconcileState::Success { orders, unresolved } = &state else {
            panic!("expected success, got {state:?}");
        };
        assert_eq!(orders.len(), 2);
        assert!(unresolved.is_empty());
        assert!(
            sessions.get("s1", DEFAULT_BUNDLE_KEY).await.is_none(),
            "the bundle is consumed by the return"
        );

        let view = Confirmation::from_reconcile(&state);
        assert_eq!(view.actions[0].path, "/orders");

        // The tab that started checkout polls without gateway parameters.
        let poll = flow
            .handle_gateway_return(&GatewayCallbackParams::default())
            .await;
        assert!(poll.is_terminal());
        assert_eq!(poll, state);
        assert_eq!(
            flow.payment_status(Some(handoff.transaction_id)).await,
            state
        );
    }

    #[tokio::test]
    async fn test_new_checkout_resets_the_processing_screen() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![farm("f1", vec![item(1, 11, 20_000, 1)])]))
            .with_address(1)
            .with_fee("f1", 15_000)
            .with_payment_url("https://sandbox.vnpayment.vn/pay");
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);

        flow.place(request(PaymentMethod::BankTransfer), &mut AbortSignal::never())
            .await
            .unwrap();
        let declined = GatewayCallbackParams::from_pairs([(RESPONSE_CODE_PARAM, "24")]);
        assert!(flow.handle_gateway_return(&declined).await.is_terminal());
        assert!(flow.payment_status(None).await.is_terminal());

        flow.place(request(PaymentMethod::BankTransfer), &mut AbortSignal::never())
            .await
            .unwrap();
        assert_eq!(flow.payment_status(None).await, ReconcileState::Processing);
    }

    #[tokio::test]
    async fn test_short_payment_method_from_the_form() {
        let request: CheckoutRequest = serde_json::from_str(
            r#"{"customerId": 1, "addressId": 1, "paymentMethod": "cod"}"#,
        )
        .unwrap();
        assert_eq!(request.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(request.source, CheckoutSource::Cart);
        assert!(request.selection.is_none());

        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![farm("f1", vec![item(1, 11, 20_000, 1)])]))
            .with_address(1)
            .with_fee("f1", 15_000);
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);
        let outcome = flow.place(request, &mut AbortSignal::never()).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Confirmed(_)));
    }

    #[tokio::test]
    async fn test_place_charges_the_quotes_shown_on_the_page() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![
                farm("f1", vec![item(1, 11, 20_000, 1)]),
                farm("f2", vec![item(2, 12, 5_000, 1)]),
            ]))
            .with_address(1)
            .with_address(2)
            .with_fee("f1", 15_000)
            .with_fee("f2", 20_000);
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);
        let fee_calls = || {
            backend
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::ShippingFee { .. }))
                .count()
        };

        flow.prepare(CheckoutSource::Cart, None, Some(1)).await.unwrap();
        flow.prepare(CheckoutSource::Cart, None, Some(1)).await.unwrap();
        assert_eq!(fee_calls(), 2, "unchanged address and cart reuse the quotes");

        flow.prepare(CheckoutSource::Cart, None, Some(2)).await.unwrap();
        assert_eq!(fee_calls(), 4, "a new address is quoted again");

        flow.place(request(PaymentMethod::CashOnDelivery), &mut AbortSignal::never())
            .await
            .unwrap();
        assert_eq!(fee_calls(), 6, "placing for address 1 re-quotes");
        assert!(sessions.get("s1", SHIPPING_QUOTE_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_gateway_decline_end_to_end() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![farm("f1", vec![item(1, 11, 20_000, 1)])]))
            .with_address(1)
            .with_fee("f1", 15_000)
            .with_payment_url("https://sandbox.vnpayment.vn/pay");
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);

        let CheckoutOutcome::AwaitingPayment(handoff) = flow
            .place(request(PaymentMethod::BankTransfer), &mut AbortSignal::never())
            .await
            .unwrap()
        else {
            panic!("expected a payment hand-off");
        };

        let params = GatewayCallbackParams::from_pairs([
            (RESPONSE_CODE_PARAM, "24"),
            (ORDER_INFO_PARAM, handoff.order_codes.as_str()),
        ]);
        let state = flow.handle_gateway_return(&params).await;
        assert_eq!(
            state,
            ReconcileState::Failed {
                code: Some("24".to_string()),
                message: "Transaction cancelled".to_string(),
            }
        );

        let view = Confirmation::from_reconcile(&state);
        assert_eq!(view.status, ConfirmationStatus::Failed);
        assert_eq!(view.actions[0].label, "Try Again");
        assert_eq!(view.actions[0].path, "/checkout");
    }

    #[tokio::test]
    async fn test_prepare_quotes_default_address() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![
                farm("A", vec![item(1, 11, 10_000, 2)]),
                farm("B", vec![item(2, 12, 10_000, 1)]),
            ]))
            .with_address(3)
            .with_fee("B", 20_000);
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);

        let preview = flow.prepare(CheckoutSource::Cart, None, None).await.unwrap();

        assert_eq!(preview.selected_address_id, Some(3));
        assert!(preview.fees.get("A").unwrap().error.is_some());
        assert_eq!(preview.fees.fee_for("B"), Decimal::from(20_000));
        assert_eq!(preview.grand_total(), Decimal::from(30_000 + 20_000));
    }

    #[tokio::test]
    async fn test_order_failure_points_back_to_checkout() {
        let backend = MockBackend::new()
            .with_cart(sample_cart(vec![
                farm("f1", vec![item(1, 11, 10_000, 1)]),
                farm("f2", vec![item(2, 12, 10_000, 1)]),
            ]))
            .with_address(1)
            .failing_order_call(2);
        let sessions = MemorySessionStore::new();
        let (checkout, gateway) = (CheckoutConfig::default(), GatewayConfig::default());
        let flow = CheckoutFlow::new(&backend, &sessions, "s1", &checkout, &gateway);

        let err = flow
            .place(request(PaymentMethod::CashOnDelivery), &mut AbortSignal::never())
            .await
            .unwrap_err();

        assert_eq!(err.next_step(), NextStep::BackToCheckout);
        assert_eq!(
            err.user_message(),
            "Could not place the order for Farm f2: Batch is out of stock"
        );
        let CheckoutError::Submission(e) = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(e.created().len(), 1);
    }
}
