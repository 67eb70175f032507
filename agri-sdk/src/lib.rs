//! Wire types and HTTP client for the AgriConnect storefront API.
//!
//! The `objects` module mirrors the JSON shapes the storefront backend
//! speaks; `vnpay` covers the payment gateway's return parameters. The typed
//! HTTP client lives behind the `client` feature.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod vnpay;
