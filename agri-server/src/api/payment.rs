//! VNPay return handling.
//!
//! # Endpoints
//!
//! - `GET /payment/vnpay-return` – the gateway redirects the browser here
//! - `GET /api/payment/status`   – polled by the processing screen
//!
//! Both answer with the reconciler's verdict and the screen to show for it.
//! The return's verdict is kept in the session, which is how the tab still
//! polling the status learns the outcome.

use std::collections::BTreeMap;

use agri_core::checkout::CheckoutFlow;
use agri_core::presenter::Confirmation;
use agri_core::reconcile::ReconcileState;
use agri_core::session::SessionStore;
use agri_sdk::vnpay::GatewayCallbackParams;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::checkout::AUTH_TOKEN_KEY;
use crate::api::extractors::{BearerToken, BrowserSession};
use crate::state::AppState;

/// Query parameter the processing screen uses to name its checkout.
const TRANSACTION_ID_PARAM: &str = "transactionId";

/// Build the payment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment/vnpay-return", get(payment_return))
        .route("/api/payment/status", get(payment_status))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResultResponse {
    #[serde(flatten)]
    state: ReconcileState,
    terminal: bool,
    confirmation: Confirmation,
}

impl From<ReconcileState> for PaymentResultResponse {
    fn from(state: ReconcileState) -> Self {
        Self {
            terminal: state.is_terminal(),
            confirmation: Confirmation::from_reconcile(&state),
            state,
        }
    }
}

/// `GET /payment/vnpay-return`: reconcile the gateway redirect.
async fn payment_return(
    state: State<AppState>,
    session: BrowserSession,
    bearer: BearerToken,
    Query(raw): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let params = GatewayCallbackParams::from_pairs(raw);
    tracing::info!(
        session = %session.id(),
        code = ?params.response_code,
        txn_ref = ?params.txn_ref,
        "Gateway return received"
    );
    let verdict = reconcile(&state, &session, bearer, &params).await;
    (session, Json(PaymentResultResponse::from(verdict)))
}

/// `GET /api/payment/status`: the processing screen's poll.
///
/// With gateway parameters this reconciles like the return does. Without
/// them it answers with the verdict already reached for `transactionId`
/// (or the session's latest), and processing until there is one.
async fn payment_status(
    state: State<AppState>,
    session: BrowserSession,
    bearer: BearerToken,
    Query(mut raw): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let transaction_id = raw
        .remove(TRANSACTION_ID_PARAM)
        .and_then(|id| Uuid::parse_str(&id).ok());
    let params = GatewayCallbackParams::from_pairs(raw);

    let verdict = if params.is_present() {
        reconcile(&state, &session, bearer, &params).await
    } else {
        let backend = state.storefront(None).await;
        let checkout = state.config.checkout.read().await.clone();
        let gateway = state.config.gateway.read().await.clone();
        CheckoutFlow::new(&backend, &state.sessions, session.id(), &checkout, &gateway)
            .payment_status(transaction_id)
            .await
    };
    (session, Json(PaymentResultResponse::from(verdict)))
}

async fn reconcile(
    state: &AppState,
    session: &BrowserSession,
    BearerToken(token): BearerToken,
    params: &GatewayCallbackParams,
) -> ReconcileState {
    let token = match token {
        Some(token) => Some(token),
        None => state.sessions.get(session.id(), AUTH_TOKEN_KEY).await,
    };
    let backend = state.storefront(token).await;
    let checkout = state.config.checkout.read().await.clone();
    let gateway = state.config.gateway.read().await.clone();
    let flow = CheckoutFlow::new(&backend, &state.sessions, session.id(), &checkout, &gateway);

    let verdict = flow.handle_gateway_return(params).await;
    if verdict.is_terminal() {
        state.sessions.remove(session.id(), AUTH_TOKEN_KEY).await;
    }
    verdict
}
