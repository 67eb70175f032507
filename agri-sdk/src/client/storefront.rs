//! Storefront API client (checkout front-end → storefront backend).
//!
//! Requests carry the customer's bearer token when one is set; the backend
//! scopes carts, addresses and orders to it.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{
    Address, CartSnapshot, CreateOrderRequest, CreatePaymentRequest, MaybeWrapped, OrderResponse,
    PaymentUrlResponse, ShippingFeeQuery, ShippingFeeResponse,
};
use rust_decimal::Decimal;

/// Typed HTTP client for the storefront REST API.
#[derive(Debug, Clone)]
pub struct StorefrontClient {
    http: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl StorefrontClient {
    /// Create a new `StorefrontClient` for the backend rooted at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
            bearer_token: None,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Authenticate every request as the given customer.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `GET /api/cart` – the customer's cart grouped by farm.
    pub async fn get_cart(&self) -> Result<CartSnapshot, ClientError> {
        let url = self.base_url.join("/api/cart")?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/addresses` – the customer's saved delivery addresses.
    pub async fn list_addresses(&self) -> Result<Vec<Address>, ClientError> {
        let url = self.base_url.join("/api/addresses")?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/shipping/calculate-fee` – shipping fee for one farm's parcel.
    pub async fn shipping_fee(&self, query: &ShippingFeeQuery) -> Result<Decimal, ClientError> {
        let url = self.base_url.join("/api/shipping/calculate-fee")?;
        let resp = self
            .authorize(self.http.get(url).query(query))
            .send()
            .await?;
        let fee: ShippingFeeResponse = parse_response(resp).await?;
        Ok(fee.fee())
    }

    /// `POST /api/orders` – create one order.
    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        let url = self.base_url.join("/api/orders")?;
        let resp = self
            .authorize(self.http.post(url).json(request))
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /api/payments/vnpay/create-payment` – one gateway URL paying
    /// for every listed order.
    pub async fn create_payment_url(&self, order_ids: &[i64]) -> Result<Url, ClientError> {
        let url = self.base_url.join("/api/payments/vnpay/create-payment")?;
        let body = CreatePaymentRequest {
            order_ids: order_ids.to_vec(),
        };
        let resp = self
            .authorize(self.http.post(url).json(&body))
            .send()
            .await?;
        let payment: PaymentUrlResponse = parse_response(resp).await?;
        let payment_url = payment
            .payment_url
            .filter(|u| !u.is_empty())
            .ok_or(ClientError::MissingPaymentUrl)?;
        Ok(Url::parse(&payment_url)?)
    }

    /// `GET /api/orders/code/{order_code}` – look an order up by its code.
    pub async fn get_order_by_code(&self, order_code: &str) -> Result<OrderResponse, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/orders/code/{}",
            urlencoding::encode(order_code)
        ))?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    let wrapped: MaybeWrapped<T> = serde_json::from_slice(&bytes)?;
    Ok(wrapped.into_inner())
}
