//! Payment return reconciler.
//!
//! Turns the gateway's return parameters into a verdict:
//! `processing → success | failed`. Both outcomes are terminal. Running
//! again with the same parameters resolves the orders again.

use agri_sdk::objects::OrderResponse;
use agri_sdk::vnpay::{self, GatewayCallbackParams};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::StorefrontBackend;
use crate::order_code::split_order_info;
use crate::session::PaymentBundle;

/// Shown when the gateway reported success but no order could be loaded.
pub const ORDERS_UNAVAILABLE_MESSAGE: &str =
    "Payment completed, but the order details could not be retrieved";
/// Shown when neither the gateway nor the session names any order.
pub const NO_ORDER_INFO_MESSAGE: &str = "The payment gateway returned no order information";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconcileState {
    /// The gateway has not reported back yet.
    Processing,
    /// At least one order resolved. `unresolved` lists the codes that
    /// could not be loaded.
    Success {
        orders: Vec<OrderResponse>,
        unresolved: Vec<String>,
    },
    Failed {
        code: Option<String>,
        message: String,
    },
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReconcileState::Processing)
    }

    fn failed(code: Option<&str>, message: impl Into<String>) -> Self {
        ReconcileState::Failed {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Resolves gateway returns against the order service.
pub struct Reconciler<'a, B: StorefrontBackend + ?Sized> {
    backend: &'a B,
    success_code: &'a str,
    hash_secret: Option<&'a [u8]>,
}

impl<'a, B: StorefrontBackend + ?Sized> Reconciler<'a, B> {
    pub fn new(backend: &'a B, success_code: &'a str) -> Self {
        Self {
            backend,
            success_code,
            hash_secret: None,
        }
    }

    /// Reject returns whose `vnp_SecureHash` does not verify under `secret`.
    pub fn with_hash_secret(mut self, secret: Option<&'a [u8]>) -> Self {
        self.hash_secret = secret;
        self
    }

    /// Work out the verdict for `params`.
    ///
    /// `stored` is the session's payment bundle, used when the gateway's
    /// order info names no order.
    pub async fn reconcile(
        &self,
        params: &GatewayCallbackParams,
        stored: Option<&PaymentBundle>,
    ) -> ReconcileState {
        let code = params.response_code.as_deref();

        if let Some(message) = &params.error_message {
            warn!(%message, "Gateway return carries an error message");
            return ReconcileState::failed(code, message.clone());
        }
        let Some(code) = code else {
            return ReconcileState::Processing;
        };

        if let Some(secret) = self.hash_secret {
            if let Err(e) = params.verify(secret) {
                warn!(error = %e, txn_ref = ?params.txn_ref, "Gateway return failed verification");
                return ReconcileState::failed(
                    Some(vnpay::INVALID_SIGNATURE_CODE),
                    vnpay::response_message(vnpay::INVALID_SIGNATURE_CODE),
                );
            }
        }

        if code != self.success_code {
            info!(code, "Gateway reported a failed payment");
            return ReconcileState::failed(Some(code), vnpay::response_message(code));
        }

        let mut order_codes = params
            .order_info
            .as_deref()
            .map(split_order_info)
            .unwrap_or_default();
        if order_codes.is_empty() {
            if let Some(bundle) = stored {
                order_codes = bundle.order_codes.clone();
            }
        }
        if order_codes.is_empty() {
            warn!("Successful gateway return names no orders");
            return ReconcileState::failed(Some(code), NO_ORDER_INFO_MESSAGE);
        }

        let lookups = order_codes.iter().map(|order_code| async move {
            let result = self.backend.get_order_by_code(order_code).await;
            (order_code, result)
        });

        let mut orders = Vec::new();
        let mut unresolved = Vec::new();
        for (order_code, result) in join_all(lookups).await {
            match result {
                Ok(order) => orders.push(order),
                Err(e) => {
                    warn!(%order_code, error = %e, "Could not resolve order after payment");
                    unresolved.push(order_code.clone());
                }
            }
        }

        if orders.is_empty() {
            return ReconcileState::failed(Some(code), ORDERS_UNAVAILABLE_MESSAGE);
        }
        info!(
            resolved = orders.len(),
            unresolved = unresolved.len(),
            "Payment reconciled"
        );
        ReconcileState::Success { orders, unresolved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use agri_sdk::objects::{OrderStatus, PaymentMethod, PaymentStatus};
    use agri_sdk::vnpay::{ORDER_INFO_PARAM, RESPONSE_CODE_PARAM, SECURE_HASH_PARAM, sign_params};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn order(order_id: i64, order_code: &str) -> OrderResponse {
        OrderResponse {
            order_id,
            order_code: order_code.to_string(),
            total_price: Decimal::from(50_000),
            shipping_fee: Decimal::from(15_000),
            customer: None,
            address: None,
            order_items: Vec::new(),
            order_status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::BankTransfer,
        }
    }

    fn seeded(codes: &[&str]) -> MockBackend {
        let backend = MockBackend::new();
        for (i, code) in codes.iter().enumerate() {
            backend.seed_order(order(i as i64 + 1, code));
        }
        backend
    }

    fn params(code: &str, info: &str) -> GatewayCallbackParams {
        GatewayCallbackParams::from_pairs([(RESPONSE_CODE_PARAM, code), (ORDER_INFO_PARAM, info)])
    }

    #[tokio::test]
    async fn test_success_resolves_every_order() {
        let backend = seeded(&["ORD-1-a", "ORD-2-b"]);
        let state = Reconciler::new(&backend, "00")
            .reconcile(&params("00", "ORD-1-a,ORD-2-b"), None)
            .await;
        let ReconcileState::Success { orders, unresolved } = state else {
            panic!("expected success, got {state:?}");
        };
        assert_eq!(orders.len(), 2);
        assert!(unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_partial_resolution_is_success_with_unresolved() {
        let backend = seeded(&["ORD-1-a", "ORD-2-b"]).missing_order("ORD-2-b");
        let state = Reconciler::new(&backend, "00")
            .reconcile(&params("00", "ORD-1-aORD-2-b"), None)
            .await;
        assert_eq!(
            state,
            ReconcileState::Success {
                orders: vec![order(1, "ORD-1-a")],
                unresolved: vec!["ORD-2-b".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_nothing_resolved_is_failure() {
        let backend = MockBackend::new();
        let state = Reconciler::new(&backend, "00")
            .reconcile(&params("00", "ORD-9-z"), None)
            .await;
        assert_eq!(
            state,
            ReconcileState::Failed {
                code: Some("00".to_string()),
                message: ORDERS_UNAVAILABLE_MESSAGE.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_declined_code_maps_to_message() {
        let backend = seeded(&["ORD-1-a"]);
        let state = Reconciler::new(&backend, "00")
            .reconcile(&params("24", "ORD-1-a"), None)
            .await;
        assert_eq!(
            state,
            ReconcileState::Failed {
                code: Some("24".to_string()),
                message: "Transaction cancelled".to_string(),
            }
        );
        assert!(backend.calls().is_empty(), "declined returns look nothing up");

        let state = Reconciler::new(&backend, "00")
            .reconcile(&params("88", "ORD-1-a"), None)
            .await;
        assert!(matches!(
            state,
            ReconcileState::Failed { ref message, .. } if message == "Payment failed with code: 88"
        ));
    }

    #[tokio::test]
    async fn test_error_message_short_circuits() {
        let backend = seeded(&["ORD-1-a"]);
        let params = GatewayCallbackParams::from_pairs([
            (RESPONSE_CODE_PARAM, "00"),
            ("errorMessage", "Invalid checksum"),
        ]);
        let state = Reconciler::new(&backend, "00").reconcile(&params, None).await;
        assert!(matches!(
            state,
            ReconcileState::Failed { ref message, .. } if message == "Invalid checksum"
        ));
    }

    #[tokio::test]
    async fn test_missing_params_is_still_processing() {
        let backend = MockBackend::new();
        let state = Reconciler::new(&backend, "00")
            .reconcile(&GatewayCallbackParams::default(), None)
            .await;
        assert_eq!(state, ReconcileState::Processing);
        assert!(!state.is_terminal());
    }

    #[tokio::test]
    async fn test_falls_back_to_stored_bundle() {
        let backend = seeded(&["ORD-1-a"]);
        let bundle = PaymentBundle::new(Uuid::new_v4(), vec!["ORD-1-a".to_string()]);
        let params = GatewayCallbackParams::from_pairs([(RESPONSE_CODE_PARAM, "00")]);
        let state = Reconciler::new(&backend, "00")
            .reconcile(&params, Some(&bundle))
            .await;
        assert!(matches!(state, ReconcileState::Success { ref orders, .. } if orders.len() == 1));
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let backend = seeded(&["ORD-1-a"]);
        let secret: &[u8] = b"hash-secret";
        let mut raw: BTreeMap<String, String> = [(RESPONSE_CODE_PARAM, "00"), (ORDER_INFO_PARAM, "ORD-1-a")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        raw.insert(SECURE_HASH_PARAM.to_string(), sign_params(&raw, b"wrong"));

        let state = Reconciler::new(&backend, "00")
            .with_hash_secret(Some(secret))
            .reconcile(&GatewayCallbackParams::from_pairs(raw.clone()), None)
            .await;
        assert!(matches!(state, ReconcileState::Failed { ref code, .. } if code.as_deref() == Some("97")));

        raw.insert(SECURE_HASH_PARAM.to_string(), sign_params(&raw, secret));
        let state = Reconciler::new(&backend, "00")
            .with_hash_secret(Some(secret))
            .reconcile(&GatewayCallbackParams::from_pairs(raw), None)
            .await;
        assert!(matches!(state, ReconcileState::Success { .. }));
    }
}
