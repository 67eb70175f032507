//! Runtime configuration re-exports.
//!
//! The validated config types live in `agri-core::config` so the checkout
//! flow can read them; this module re-exports them for convenience.

pub use agri_core::config::{
    BackendConfig, CheckoutConfig, GatewayConfig, ServerConfig, SharedConfig,
};
