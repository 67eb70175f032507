//! HTTP client for the storefront API.
//!
//! Gated behind the `client` cargo feature so crates that only need the
//! shared types do not pull in `reqwest`.

mod storefront;

pub use storefront::StorefrontClient;

pub use reqwest::StatusCode;

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path, or the
    /// gateway handed back something that is not a URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The payment service answered without a gateway URL.
    #[error("payment service returned no payment url")]
    MissingPaymentUrl,
}

impl ClientError {
    /// A short message suitable for a toast notification.
    ///
    /// API errors surface the backend's own `message` field when the body
    /// is JSON carrying one.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { status, body } => {
                #[derive(serde::Deserialize)]
                struct Body {
                    message: String,
                }
                serde_json::from_str::<Body>(body)
                    .map(|b| b.message)
                    .unwrap_or_else(|_| format!("request failed with status {status}"))
            }
            ClientError::Http(_) => "could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_backend_message() {
        let err = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"message":"Batch is out of stock"}"#.to_string(),
        };
        assert_eq!(err.user_message(), "Batch is out of stock");

        let err = ClientError::Api {
            status: StatusCode::BAD_GATEWAY,
            body: "<html>".to_string(),
        };
        assert_eq!(err.user_message(), "request failed with status 502 Bad Gateway");
    }
}
