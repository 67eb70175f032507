//! Cart types as returned by the cart service.
//!
//! The cart is grouped by farm: every farm contributes one [`FarmGroup`]
//! and, at checkout, one order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The authenticated customer's cart, grouped by farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    #[serde(with = "super::string_or_number")]
    pub cart_id: String,
    pub total_price: Decimal,
    #[serde(default)]
    pub customer: CustomerContact,
    #[serde(default, alias = "farms")]
    pub groups: Vec<FarmGroup>,
}

impl CartSnapshot {
    /// Iterate over every line item of every group.
    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    /// Sum of the `line_total` of every line item.
    pub fn items_total(&self) -> Decimal {
        self.items().map(|i| i.line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.items.is_empty())
    }
}

/// Contact details of the customer owning the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// All line items of the cart that are sold by one farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmGroup {
    #[serde(with = "super::string_or_number")]
    pub farm_id: String,
    #[serde(default)]
    pub farm_name: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl FarmGroup {
    /// Total quantity over the group's items.
    ///
    /// The shipping calculator takes this as the parcel weight.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|i| i.line_total).sum()
    }
}

/// One product batch in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub item_id: i64,
    pub batch_id: i64,
    #[serde(default)]
    pub batch_code: String,
    #[serde(default)]
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub units: String,
    pub line_total: Decimal,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub season_name: Option<String>,
    #[serde(default)]
    pub season_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_parsing_accepts_numeric_ids() {
        let json = r#"{
            "cartId": 42,
            "totalPrice": 150000,
            "customer": {"fullname": "Nguyen Van A", "email": "a@example.com", "phone": "0900000000"},
            "farms": [{
                "farmId": 7,
                "farmName": "Green Valley",
                "items": [{
                    "itemId": 1, "batchId": 11, "batchCode": "B-11",
                    "productName": "Dragon fruit", "unitPrice": 50000,
                    "quantity": 3, "units": "kg", "lineTotal": 150000
                }]
            }]
        }"#;
        let cart: CartSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(cart.cart_id, "42");
        assert_eq!(cart.groups[0].farm_id, "7");
        assert_eq!(cart.groups[0].total_quantity(), 3);
        assert_eq!(cart.items_total(), Decimal::from(150_000));
        assert!(cart.groups[0].items[0].season_name.is_none());
    }

    #[test]
    fn test_total_quantity_does_not_overflow() {
        let item = LineItem {
            item_id: 1,
            batch_id: 11,
            batch_code: String::new(),
            product_name: String::new(),
            unit_price: Decimal::ONE,
            quantity: u32::MAX,
            units: String::new(),
            line_total: Decimal::from(u32::MAX),
            category_name: None,
            season_name: None,
            season_status: None,
        };
        let group = FarmGroup {
            farm_id: "1".to_string(),
            farm_name: String::new(),
            items: vec![item.clone(), item],
        };
        assert_eq!(group.total_quantity(), 2 * u64::from(u32::MAX));
        assert_eq!(group.subtotal(), Decimal::from(2 * u64::from(u32::MAX)));
    }
}
