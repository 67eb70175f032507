//! In-memory storefront backend for flow tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use agri_sdk::client::{ClientError, StatusCode};
use agri_sdk::objects::{
    Address, CartSnapshot, CreateOrderRequest, CustomerContact, FarmGroup, LineItem,
    OrderItemResponse, OrderResponse, OrderStatus, PaymentStatus, ShippingFeeQuery,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use url::Url;

use crate::backend::StorefrontBackend;

/// A backend call, recorded in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetCart,
    ListAddresses,
    ShippingFee { farm_id: String, weight: u64 },
    CreateOrder { order_code: String, batch_ids: Vec<i64> },
    CreatePaymentUrl(Vec<i64>),
    GetOrder(String),
}

pub(crate) struct MockBackend {
    cart: Option<CartSnapshot>,
    addresses: Vec<Address>,
    fees: HashMap<String, Decimal>,
    /// How long the fee lookup of a farm takes.
    fee_delays: HashMap<String, Duration>,
    /// Farm ids in the order their fee lookups answered.
    fee_answers: Mutex<Vec<String>>,
    /// 1-based index of the `create_order` call that fails.
    fail_order_call: Option<usize>,
    /// How long each `create_order` call takes.
    order_delay: Option<Duration>,
    payment_url: Option<Url>,
    /// Order codes `get_order_by_code` refuses to resolve.
    missing_orders: HashSet<String>,
    orders: Mutex<HashMap<String, OrderResponse>>,
    calls: Mutex<Vec<Call>>,
    order_calls: AtomicUsize,
    next_order_id: AtomicI64,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            cart: None,
            addresses: Vec::new(),
            fees: HashMap::new(),
            fee_delays: HashMap::new(),
            fee_answers: Mutex::new(Vec::new()),
            fail_order_call: None,
            order_delay: None,
            payment_url: None,
            missing_orders: HashSet::new(),
            orders: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            order_calls: AtomicUsize::new(0),
            next_order_id: AtomicI64::new(1),
        }
    }

    pub(crate) fn with_cart(mut self, cart: CartSnapshot) -> Self {
        self.cart = Some(cart);
        self
    }

    pub(crate) fn with_address(mut self, address_id: i64) -> Self {
        self.addresses.push(address(address_id));
        self
    }

    /// Farms without a configured fee fail their fee lookup.
    pub(crate) fn with_fee(mut self, farm_id: &str, fee: i64) -> Self {
        self.fees.insert(farm_id.to_string(), Decimal::from(fee));
        self
    }

    pub(crate) fn with_fee_delay(mut self, farm_id: &str, delay: Duration) -> Self {
        self.fee_delays.insert(farm_id.to_string(), delay);
        self
    }

    pub(crate) fn fee_answer_order(&self) -> Vec<String> {
        self.fee_answers.lock().unwrap().clone()
    }

    pub(crate) fn failing_order_call(mut self, call: usize) -> Self {
        self.fail_order_call = Some(call);
        self
    }

    pub(crate) fn with_order_delay(mut self, delay: Duration) -> Self {
        self.order_delay = Some(delay);
        self
    }

    pub(crate) fn with_payment_url(mut self, url: &str) -> Self {
        self.payment_url = Url::parse(url).ok();
        self
    }

    pub(crate) fn missing_order(mut self, order_code: &str) -> Self {
        self.missing_orders.insert(order_code.to_string());
        self
    }

    /// Store an order as if the backend had created it earlier.
    pub(crate) fn seed_order(&self, order: OrderResponse) {
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_code.clone(), order);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn created_codes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateOrder { order_code, .. } => Some(order_code),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn server_error(body: &str) -> ClientError {
    ClientError::Api {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: format!(r#"{{"message":"{body}"}}"#),
    }
}

fn not_found() -> ClientError {
    ClientError::Api {
        status: StatusCode::NOT_FOUND,
        body: r#"{"message":"Order not found"}"#.to_string(),
    }
}

#[async_trait]
impl StorefrontBackend for MockBackend {
    async fn get_cart(&self) -> Result<CartSnapshot, ClientError> {
        self.record(Call::GetCart);
        self.cart.clone().ok_or_else(|| server_error("Cart unavailable"))
    }

    async fn list_addresses(&self) -> Result<Vec<Address>, ClientError> {
        self.record(Call::ListAddresses);
        Ok(self.addresses.clone())
    }

    async fn shipping_fee(&self, query: &ShippingFeeQuery) -> Result<Decimal, ClientError> {
        self.record(Call::ShippingFee {
            farm_id: query.farm_id.clone(),
            weight: query.weight,
        });
        if let Some(delay) = self.fee_delays.get(&query.farm_id) {
            tokio::time::sleep(*delay).await;
        }
        self.fee_answers
            .lock()
            .unwrap()
            .push(query.farm_id.clone());
        self.fees
            .get(&query.farm_id)
            .copied()
            .ok_or_else(|| server_error("Shipping provider unavailable"))
    }

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        self.record(Call::CreateOrder {
            order_code: request.order_code.clone(),
            batch_ids: request.order_items.iter().map(|i| i.batch_id).collect(),
        });
        if let Some(delay) = self.order_delay {
            tokio::time::sleep(delay).await;
        }
        let call = self.order_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_order_call == Some(call) {
            return Err(server_error("Batch is out of stock"));
        }
        let order = OrderResponse {
            order_id: self.next_order_id.fetch_add(1, Ordering::SeqCst),
            order_code: request.order_code.clone(),
            total_price: Decimal::from(10_000) * Decimal::from(request.order_items.len()),
            shipping_fee: request.shipping_fee,
            customer: None,
            address: self
                .addresses
                .iter()
                .find(|a| a.address_id == request.address_id)
                .cloned(),
            order_items: request
                .order_items
                .iter()
                .map(|i| OrderItemResponse {
                    batch_id: i.batch_id,
                    product_name: None,
                    quantity: i.quantity,
                    unit_price: Decimal::from(10_000),
                })
                .collect(),
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: request.payment_method,
        };
        self.seed_order(order.clone());
        Ok(order)
    }

    async fn create_payment_url(&self, order_ids: &[i64]) -> Result<Url, ClientError> {
        self.record(Call::CreatePaymentUrl(order_ids.to_vec()));
        self.payment_url
            .clone()
            .ok_or(ClientError::MissingPaymentUrl)
    }

    async fn get_order_by_code(&self, order_code: &str) -> Result<OrderResponse, ClientError> {
        self.record(Call::GetOrder(order_code.to_string()));
        if self.missing_orders.contains(order_code) {
            return Err(not_found());
        }
        self.orders
            .lock()
            .unwrap()
            .get(order_code)
            .cloned()
            .ok_or_else(not_found)
    }
}

pub(crate) fn address(address_id: i64) -> Address {
    Address {
        address_id,
        recipient_name: "Le Thi C".to_string(),
        phone: "0911222333".to_string(),
        street: "45 Tran Hung Dao".to_string(),
        ward: "Ward 1".to_string(),
        district: "Ninh Kieu".to_string(),
        province: "Can Tho".to_string(),
        is_default: true,
    }
}

pub(crate) fn item(item_id: i64, batch_id: i64, unit_price: i64, quantity: u32) -> LineItem {
    let unit_price = Decimal::from(unit_price);
    LineItem {
        item_id,
        batch_id,
        batch_code: format!("B-{batch_id}"),
        product_name: format!("Product {batch_id}"),
        unit_price,
        quantity,
        units: "kg".to_string(),
        line_total: unit_price * Decimal::from(quantity),
        category_name: Some("Fruit".to_string()),
        season_name: Some("Summer 2024".to_string()),
        season_status: Some("Harvesting".to_string()),
    }
}

pub(crate) fn farm(farm_id: &str, items: Vec<LineItem>) -> FarmGroup {
    FarmGroup {
        farm_id: farm_id.to_string(),
        farm_name: format!("Farm {farm_id}"),
        items,
    }
}

pub(crate) fn sample_cart(groups: Vec<FarmGroup>) -> CartSnapshot {
    let total_price = groups
        .iter()
        .flat_map(|g| g.items.iter())
        .map(|i| i.line_total)
        .sum();
    CartSnapshot {
        cart_id: "cart-1".to_string(),
        total_price,
        customer: CustomerContact {
            fullname: "Le Thi C".to_string(),
            email: "c@example.com".to_string(),
            phone: "0911222333".to_string(),
        },
        groups,
    }
}
