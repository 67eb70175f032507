//! The storefront backend as seen by the checkout flow.
//!
//! Every step of the flow talks to the backend through
//! [`StorefrontBackend`], so the flow can run against the real HTTP client or
//! an in-memory stand-in.

use agri_sdk::client::{ClientError, StorefrontClient};
use agri_sdk::objects::{
    Address, CartSnapshot, CreateOrderRequest, OrderResponse, ShippingFeeQuery,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use url::Url;

/// REST operations the checkout flow consumes.
#[async_trait]
pub trait StorefrontBackend: Send + Sync {
    /// The authenticated customer's cart, grouped by farm.
    async fn get_cart(&self) -> Result<CartSnapshot, ClientError>;

    async fn list_addresses(&self) -> Result<Vec<Address>, ClientError>;

    /// Fee for shipping `weight` units from one farm to one address.
    async fn shipping_fee(&self, query: &ShippingFeeQuery) -> Result<Decimal, ClientError>;

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError>;

    /// A single gateway URL that pays for every listed order.
    async fn create_payment_url(&self, order_ids: &[i64]) -> Result<Url, ClientError>;

    async fn get_order_by_code(&self, order_code: &str) -> Result<OrderResponse, ClientError>;
}

#[async_trait]
impl StorefrontBackend for StorefrontClient {
    async fn get_cart(&self) -> Result<CartSnapshot, ClientError> {
        StorefrontClient::get_cart(self).await
    }

    async fn list_addresses(&self) -> Result<Vec<Address>, ClientError> {
        StorefrontClient::list_addresses(self).await
    }

    async fn shipping_fee(&self, query: &ShippingFeeQuery) -> Result<Decimal, ClientError> {
        StorefrontClient::shipping_fee(self, query).await
    }

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        StorefrontClient::create_order(self, request).await
    }

    async fn create_payment_url(&self, order_ids: &[i64]) -> Result<Url, ClientError> {
        StorefrontClient::create_payment_url(self, order_ids).await
    }

    async fn get_order_by_code(&self, order_code: &str) -> Result<OrderResponse, ClientError> {
        StorefrontClient::get_order_by_code(self, order_code).await
    }
}
