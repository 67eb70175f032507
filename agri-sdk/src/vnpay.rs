//! VNPay return parameters and their signature.
//!
//! After payment the gateway redirects the browser to the configured return
//! URL with `vnp_*` query parameters. For a multi-order checkout the
//! `vnp_OrderInfo` field carries every order code concatenated together.
//!
//! The signature scheme is:
//!
//! ```text
//! vnp_SecureHash = hex(HMAC-SHA512(secret, "k1=v1&k2=v2&..."))
//! ```
//!
//! over every `vnp_*` parameter except the hash fields themselves, sorted
//! by key, with form-encoded values.

use std::borrow::Cow;
use std::collections::BTreeMap;

pub const RESPONSE_CODE_PARAM: &str = "vnp_ResponseCode";
pub const ORDER_INFO_PARAM: &str = "vnp_OrderInfo";
pub const TXN_REF_PARAM: &str = "vnp_TxnRef";
pub const AMOUNT_PARAM: &str = "vnp_Amount";
pub const TRANSACTION_NO_PARAM: &str = "vnp_TransactionNo";
pub const BANK_CODE_PARAM: &str = "vnp_BankCode";
pub const PAY_DATE_PARAM: &str = "vnp_PayDate";
pub const SECURE_HASH_PARAM: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_PARAM: &str = "vnp_SecureHashType";
/// Set by the storefront backend instead of the gateway fields when it
/// rejected the return itself.
pub const ERROR_MESSAGE_PARAM: &str = "errorMessage";

/// Response code of a successful payment.
pub const SUCCESS_CODE: &str = "00";
/// Response code reported when the return signature does not verify.
pub const INVALID_SIGNATURE_CODE: &str = "97";

/// User-facing message for a gateway response code.
///
/// Unknown codes fall back to a generic message embedding the raw code.
pub fn response_message(code: &str) -> Cow<'static, str> {
    let message = match code {
        "00" => "Transaction successful",
        "07" => "Transaction deducted successfully but flagged as suspicious",
        "09" => "Card/account not registered for Internet Banking",
        "10" => "Card/account authentication failed more than 3 times",
        "11" => "Payment timeout expired",
        "12" => "Card/account is locked",
        "13" => "Incorrect OTP entered",
        "24" => "Transaction cancelled",
        "51" => "Insufficient account balance",
        "65" => "Daily transaction limit exceeded",
        "75" => "Payment bank is under maintenance",
        "79" => "Incorrect payment password entered too many times",
        "97" => "Invalid payment signature",
        "99" => "Unknown error",
        other => return Cow::Owned(format!("Payment failed with code: {other}")),
    };
    Cow::Borrowed(message)
}

/// Errors produced when checking a gateway return.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing {SECURE_HASH_PARAM} parameter")]
    MissingHash,
    #[error("invalid hex in {SECURE_HASH_PARAM}")]
    InvalidHex,
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for GatewayError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Decoded gateway return parameters.
///
/// `raw` keeps every parameter as received so the signature can be
/// recomputed over exactly what the gateway sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayCallbackParams {
    pub response_code: Option<String>,
    pub order_info: Option<String>,
    pub txn_ref: Option<String>,
    pub amount: Option<String>,
    pub transaction_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub secure_hash: Option<String>,
    pub error_message: Option<String>,
    pub raw: BTreeMap<String, String>,
}

impl GatewayCallbackParams {
    /// Build from already-decoded `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let raw: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| raw.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            response_code: get(RESPONSE_CODE_PARAM),
            order_info: get(ORDER_INFO_PARAM),
            txn_ref: get(TXN_REF_PARAM),
            amount: get(AMOUNT_PARAM),
            transaction_no: get(TRANSACTION_NO_PARAM),
            bank_code: get(BANK_CODE_PARAM),
            pay_date: get(PAY_DATE_PARAM),
            secure_hash: get(SECURE_HASH_PARAM),
            error_message: get(ERROR_MESSAGE_PARAM),
            raw,
        }
    }

    /// Whether this looks like a gateway return at all.
    pub fn is_present(&self) -> bool {
        self.response_code.is_some() || self.error_message.is_some()
    }

    /// Verify `vnp_SecureHash` against `secret`.
    pub fn verify(&self, secret: &[u8]) -> Result<(), GatewayError> {
        let hash = self.secure_hash.as_deref().ok_or(GatewayError::MissingHash)?;
        let expected = hex::decode(hash).map_err(|_| GatewayError::InvalidHex)?;
        let data = signing_data(&self.raw);
        ring::hmac::verify(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA512, secret),
            data.as_bytes(),
            &expected,
        )?;
        Ok(())
    }
}

/// Compute the hex `vnp_SecureHash` for a set of parameters.
pub fn sign_params(params: &BTreeMap<String, String>, secret: &[u8]) -> String {
    let data = signing_data(params);
    let tag = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA512, secret),
        data.as_bytes(),
    );
    hex::encode(tag.as_ref())
}

fn signing_data(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, v)| {
            k.starts_with("vnp_")
                && k.as_str() != SECURE_HASH_PARAM
                && k.as_str() != SECURE_HASH_TYPE_PARAM
                && !v.is_empty()
        })
        .map(|(k, v)| format!("{k}={}", form_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
