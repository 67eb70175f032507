//! Checkout API handlers.
//!
//! Called by the storefront's checkout page with the customer's bearer
//! token. The session cookie ties a placement to its later gateway return.

use agri_core::cart::CheckoutSource;
use agri_core::checkout::{CheckoutFlow, CheckoutRequest};
use agri_core::session::SessionStore;
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::api::extractors::{BearerToken, BrowserSession};
use crate::state::AppState;

/// Session key under which the customer's token is kept for the gateway
/// return, which arrives without an `Authorization` header.
pub(crate) const AUTH_TOKEN_KEY: &str = "auth_token";

/// Build the checkout router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prepare", post(prepare))
        .route("/place", post(place))
        .route("/abort", post(abort))
}

// ---------------------------------------------------------------------------
// POST /api/checkout/prepare
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrepareRequest {
    #[serde(default)]
    source: CheckoutSource,
    #[serde(default)]
    selection: Option<Vec<i64>>,
    #[serde(default)]
    address_id: Option<i64>,
}

/// `POST /api/checkout/prepare`: load the checkout page.
///
/// Returns the adapted cart, the saved addresses and the per-farm shipping
/// fees for the chosen (or default) address.
async fn prepare(
    state: State<AppState>,
    session: BrowserSession,
    BearerToken(token): BearerToken,
    Json(body): Json<PrepareRequest>,
) -> Response {
    let backend = state.storefront(token).await;
    let checkout = state.config.checkout.read().await.clone();
    let gateway = state.config.gateway.read().await.clone();
    let flow = CheckoutFlow::new(&backend, &state.sessions, session.id(), &checkout, &gateway);

    match flow
        .prepare(body.source, body.selection.as_deref(), body.address_id)
        .await
    {
        Ok(preview) => (session, Json(preview)).into_response(),
        Err(e) => (session, ApiError::from(e)).into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /api/checkout/place
// ---------------------------------------------------------------------------

/// `POST /api/checkout/place`: create one order per farm.
///
/// Cash on delivery answers with the confirmation screen. Bank transfer
/// answers with the VNPay URL to open in a new tab; the current tab moves to
/// the processing screen.
async fn place(
    state: State<AppState>,
    session: BrowserSession,
    BearerToken(token): BearerToken,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    if let Some(token) = &token {
        state
            .sessions
            .set(session.id(), AUTH_TOKEN_KEY, token.clone())
            .await;
    }

    let backend = state.storefront(token).await;
    let checkout = state.config.checkout.read().await.clone();
    let gateway = state.config.gateway.read().await.clone();
    let flow = CheckoutFlow::new(&backend, &state.sessions, session.id(), &checkout, &gateway);

    let (placement, mut abort) = state.placements.begin(session.id()).await;
    let result = flow.place(request, &mut abort).await;
    state.placements.finish(session.id(), placement).await;

    match result {
        Ok(outcome) => (session, Json(outcome)).into_response(),
        Err(e) => (session, ApiError::from(e)).into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /api/checkout/abort
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AbortResponse {
    aborted: bool,
}

/// `POST /api/checkout/abort`: the customer left the checkout page.
///
/// Sent as a beacon on page unload. Orders already created stay created.
async fn abort(state: State<AppState>, session: BrowserSession) -> impl IntoResponse {
    let aborted = state.placements.abort(session.id()).await;
    if aborted {
        tracing::info!(session = %session.id(), "Checkout placement aborted");
    }
    (session, Json(AbortResponse { aborted }))
}
