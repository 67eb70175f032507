use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Query string of the shipping-fee calculator.
///
/// `weight` is the total quantity of the farm group; the backend has no
/// per-product weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFeeQuery {
    pub farm_id: String,
    pub address_id: i64,
    pub weight: u64,
}

/// The calculator answers with a bare number or with an object carrying
/// the fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShippingFeeResponse {
    Amount(Decimal),
    Object {
        #[serde(alias = "shippingFee")]
        fee: Decimal,
    },
}

impl ShippingFeeResponse {
    pub fn fee(&self) -> Decimal {
        match self {
            ShippingFeeResponse::Amount(fee) | ShippingFeeResponse::Object { fee } => *fee,
        }
    }
}
