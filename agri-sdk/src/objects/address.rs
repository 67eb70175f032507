use serde::{Deserialize, Serialize};

/// A delivery address saved on the customer's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(alias = "id")]
    pub address_id: i64,
    #[serde(default, alias = "fullname")]
    pub recipient_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, alias = "addressLine")]
    pub street: String,
    #[serde(default)]
    pub ward: String,
    #[serde(default)]
    pub district: String,
    #[serde(default, alias = "city")]
    pub province: String,
    #[serde(default)]
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_field_names() {
        let address: Address = serde_json::from_str(
            r#"{"id": 3, "fullname": "Tran B", "street": "12 Le Loi", "province": "Can Tho"}"#,
        )
        .unwrap();
        assert_eq!(address.address_id, 3);
        assert_eq!(address.recipient_name, "Tran B");
        assert_eq!(address.province, "Can Tho");
        assert!(address.ward.is_empty());
        assert!(!address.is_default);
    }
}
