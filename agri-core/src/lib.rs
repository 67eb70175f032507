#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

//! The checkout → payment → reconciliation flow of the AgriConnect
//! storefront.
//!
//! Leaf-first: [`cart`] adapts the cart into a checkout snapshot,
//! [`shipping`] quotes per-farm fees, [`submission`] creates one order per
//! farm, [`payment`] hands the orders to the VNPay gateway, [`reconcile`]
//! resolves the gateway's return and [`presenter`] renders the result.
//! [`checkout`] strings them together.

pub mod backend;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod order_code;
pub mod payment;
pub mod presenter;
pub mod reconcile;
pub mod session;
pub mod shipping;
pub mod submission;

#[cfg(test)]
pub(crate) mod testing;
