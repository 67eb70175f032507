//! Browser-facing API.
//!
//! # Endpoints
//!
//! - `POST /api/checkout/prepare` – snapshot, addresses and shipping fees
//! - `POST /api/checkout/place`   – create the orders, then confirm or hand off to VNPay
//! - `POST /api/checkout/abort`   – stop an in-flight placement
//! - `GET  /payment/vnpay-return` – gateway return redirect
//! - `GET  /api/payment/status`   – the processing screen's poll

pub mod checkout;
pub mod extractors;
pub mod payment;

use agri_core::checkout::CheckoutError;
use agri_core::presenter::Confirmation;
use agri_core::submission::OrderSubmissionRecord;
use agri_sdk::client::ClientError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A step of the checkout flow failed.
    Checkout(CheckoutError),
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        Self::Checkout(err)
    }
}

/// Error body: the screen to show plus any orders that already exist.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: String,
    confirmation: Confirmation,
    created_orders: &'a [OrderSubmissionRecord],
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Checkout(err) => {
                let status = checkout_status(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "Checkout failed");
                } else {
                    tracing::warn!(error = %err, "Checkout rejected");
                }
                let created: &[OrderSubmissionRecord] = match &err {
                    CheckoutError::Submission(e) => e.created(),
                    CheckoutError::Payment(agri_core::payment::PaymentError::Gateway {
                        orders,
                        ..
                    }) => orders,
                    _ => &[],
                };
                let body = ErrorBody {
                    error: err.user_message(),
                    confirmation: err.confirmation(),
                    created_orders: created,
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    use agri_core::cart::CartError;
    use agri_core::payment::PaymentError;
    use agri_core::submission::SubmissionError;

    match err {
        CheckoutError::Cart(CartError::Fetch(e)) | CheckoutError::Addresses(e) => {
            upstream_status(e)
        }
        CheckoutError::Cart(CartError::NoItemsSelected) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::Submission(SubmissionError::FarmFailed { source, .. }) => {
            upstream_status(source)
        }
        CheckoutError::Submission(SubmissionError::Aborted { .. }) => StatusCode::CONFLICT,
        CheckoutError::Submission(SubmissionError::Empty)
        | CheckoutError::Payment(PaymentError::NoOrders) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::Payment(PaymentError::Gateway { source, .. }) => upstream_status(source),
    }
}

/// Auth failures pass through so the storefront can send the customer to
/// login; everything else the backend did wrong is a bad gateway.
fn upstream_status(err: &ClientError) -> StatusCode {
    match err {
        ClientError::Api { status, .. }
            if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
        {
            *status
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}
