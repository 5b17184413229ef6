//! Midtrans payment gateway client.
//!
//! Checkout creates a Snap transaction and hands the returned token to the
//! UI. Payment notifications are not trusted as-is: the order's status is
//! re-read from the status API before anything changes.
//!
//! # API Reference
//!
//! - Snap: `POST {snap}/transactions`
//! - Status: `GET {api}/{order_id}/status`
//! - Authentication: HTTP Basic with the server key as username and an empty
//!   password.

mod types;

pub use types::*;

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use crate::config::MidtransConfig;

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com/snap/v1";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com/snap/v1";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com/v2";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com/v2";

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the gateway.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Transaction not known to the gateway.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Server key rejected.
    #[error("Unauthorized: invalid server key")]
    Unauthorized,
}

/// Midtrans API client.
#[derive(Clone)]
pub struct MidtransClient {
    inner: Arc<MidtransClientInner>,
}

struct MidtransClientInner {
    client: reqwest::Client,
    snap_url: &'static str,
    api_url: &'static str,
    is_production: bool,
}

impl MidtransClient {
    /// Create a new Midtrans client for sandbox or production.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MidtransConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let credentials =
            general_purpose::STANDARD.encode(format!("{}:", config.server_key.expose_secret()));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {credentials}"))
                .map_err(|e| PaymentError::Parse(format!("Invalid server key format: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let (snap_url, api_url) = if config.is_production {
            (PRODUCTION_SNAP_URL, PRODUCTION_API_URL)
        } else {
            (SANDBOX_SNAP_URL, SANDBOX_API_URL)
        };

        Ok(Self {
            inner: Arc::new(MidtransClientInner {
                client,
                snap_url,
                api_url,
                is_production: config.is_production,
            }),
        })
    }

    /// Create a Snap transaction for a pending order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    #[instrument(skip(self, request), fields(order_id = %request.transaction_details.order_id))]
    pub async fn create_transaction(
        &self,
        request: &SnapRequest,
    ) -> Result<SnapTransaction, PaymentError> {
        let url = format!("{}/transactions", self.inner.snap_url);
        let response = self.inner.client.post(&url).json(request).send().await?;
        self.handle_response(response).await
    }

    /// Fetch the authoritative status of a transaction.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` if the gateway does not know the order.
    #[instrument(skip(self))]
    pub async fn transaction_status(&self, order_id: &str) -> Result<StatusResponse, PaymentError> {
        let url = format!("{}/{order_id}/status", self.inner.api_url);
        let response = self.inner.client.get(&url).send().await?;
        let status: StatusResponse = self.handle_response(response).await?;

        // The status API reports missing transactions in the body with HTTP 200.
        if status.status_code.as_deref() == Some("404") || status.transaction_status.is_none() {
            return Err(PaymentError::NotFound(order_id.to_owned()));
        }
        Ok(status)
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| PaymentError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse an error response from the gateway.
    async fn parse_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return PaymentError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return PaymentError::Unauthorized;
        }

        if status == 404 {
            return PaymentError::NotFound("Transaction not found".to_string());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        PaymentError::Api { status, message }
    }
}

impl std::fmt::Debug for MidtransClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransClient")
            .field("is_production", &self.inner.is_production)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_environment_selects_urls() {
        let sandbox = MidtransClient::new(&MidtransConfig {
            server_key: SecretString::from("SB-Mid-server-abc"),
            is_production: false,
        })
        .unwrap();
        assert_eq!(sandbox.inner.snap_url, SANDBOX_SNAP_URL);
        assert_eq!(sandbox.inner.api_url, SANDBOX_API_URL);

        let production = MidtransClient::new(&MidtransConfig {
            server_key: SecretString::from("Mid-server-abc"),
            is_production: true,
        })
        .unwrap();
        assert_eq!(production.inner.api_url, PRODUCTION_API_URL);
    }

    #[test]
    fn test_debug_hides_key() {
        let client = MidtransClient::new(&MidtransConfig {
            server_key: SecretString::from("SB-Mid-server-abc"),
            is_production: false,
        })
        .unwrap();
        assert!(!format!("{client:?}").contains("SB-Mid-server-abc"));
    }
}
