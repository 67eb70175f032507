//! Custom Axum extractors for the browser-facing API.
//!
//! Provides:
//! - `BearerToken` – the customer's `Authorization: Bearer` token, forwarded
//!   to the storefront backend.
//! - `BrowserSession` – the session cookie that scopes payment bundles.
//!   Issued on first contact and returned through `IntoResponseParts`.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
    },
    response::{IntoResponseParts, ResponseParts},
};
use uuid::Uuid;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// BearerToken
// ---------------------------------------------------------------------------

/// The caller's bearer token, if any.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_from_headers(&parts.headers)))
    }
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

// ---------------------------------------------------------------------------
// BrowserSession
// ---------------------------------------------------------------------------

/// The browser session a request belongs to.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    id: String,
    /// `Set-Cookie` to send when the session was just issued.
    issued: Option<HeaderValue>,
}

impl BrowserSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn issue(cookie_name: &str) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let issued =
            HeaderValue::from_str(&format!("{cookie_name}={id}; Path=/; HttpOnly; SameSite=Lax"))
                .ok();
        Self { id, issued }
    }
}

impl FromRequestParts<AppState> for BrowserSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let checkout = state.config.checkout.read().await;
        let cookie_name = checkout.session_cookie.clone();
        drop(checkout);

        Ok(match session_from_headers(&parts.headers, &cookie_name) {
            Some(id) => Self { id, issued: None },
            None => {
                let session = Self::issue(&cookie_name);
                tracing::debug!(session = %session.id, "Issued browser session");
                session
            }
        })
    }
}

impl IntoResponseParts for BrowserSession {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(cookie) = self.issued {
            res.headers_mut().append(SET_COOKIE, cookie);
        }
        Ok(res)
    }
}

/// Find the session cookie among every `Cookie` header.
fn session_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| {
            !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
