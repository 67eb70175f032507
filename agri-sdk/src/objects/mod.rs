pub mod address;
pub mod cart;
pub mod order;
pub mod payment;
pub mod shipping;

pub use address::Address;
pub use cart::{CartSnapshot, CustomerContact, FarmGroup, LineItem};
pub use order::{
    CreateOrderRequest, OrderItemRequest, OrderItemResponse, OrderResponse, OrderStatus,
    OrderType, ParsePaymentMethodError, PaymentMethod, PaymentStatus,
};
pub use payment::{CreatePaymentRequest, PaymentUrlResponse};
pub use shipping::{ShippingFeeQuery, ShippingFeeResponse};

use serde::{Deserialize, Serialize};

/// Response body that may or may not be wrapped in a `{"data": ...}`
/// envelope.
///
/// Different storefront endpoints disagree on whether they wrap their
/// payload, so every response is read through this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaybeWrapped<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> MaybeWrapped<T> {
    pub fn into_inner(self) -> T {
        match self {
            MaybeWrapped::Wrapped { data } => data,
            MaybeWrapped::Bare(inner) => inner,
        }
    }
}

/// Serde helpers for identifiers the backend sends either as JSON strings
/// or as JSON numbers.
pub(crate) mod string_or_number {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Str(s) => s,
            Raw::Int(n) => n.to_string(),
        })
    }
}
