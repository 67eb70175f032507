use serde::{Deserialize, Serialize};

/// Body of the payment-initiation call: every order of one checkout is paid
/// through a single gateway transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_ids: Vec<i64>,
}

/// The gateway URL the customer is sent to.
///
/// Read through [`MaybeWrapped`](super::MaybeWrapped), which accepts both
/// `{"paymentUrl": ...}` and `{"data": {"paymentUrl": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUrlResponse {
    #[serde(default)]
    pub payment_url: Option<String>,
}
