//! `RajaOngkir` shipping-rate client.
//!
//! Province and city lists change rarely and are cached for 24 hours using
//! `moka`. Cost quotes are never cached.
//!
//! # API Reference
//!
//! - Base URL: `https://api.rajaongkir.com/starter` (configurable)
//! - Authentication: `key` header
//! - `POST /cost` takes a form-encoded body
//! - Every response is wrapped as `{"rajaongkir": {"status": ..., "results": ...}}`

mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ShippingConfig;

/// Errors that can occur when talking to the shipping-rate API.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Invalid API key.
    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    /// The requested courier service is not offered for this route.
    #[error("Service not available: {0}")]
    ServiceUnavailable(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Clone)]
enum CacheValue {
    Provinces(Vec<Province>),
    Cities(Vec<City>),
}

/// `RajaOngkir` API client.
#[derive(Clone)]
pub struct ShippingClient {
    inner: Arc<ShippingClientInner>,
}

struct ShippingClientInner {
    client: reqwest::Client,
    base_url: String,
    origin_city_id: String,
    item_weight_grams: u32,
    cache: Cache<String, CacheValue>,
}

impl ShippingClient {
    /// Create a new shipping-rate client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ShippingConfig) -> Result<Self, ShippingError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "key",
            HeaderValue::from_str(config.api_key.expose_secret())
                .map_err(|e| ShippingError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(100)
            .time_to_live(Duration::from_secs(24 * 60 * 60))
            .build();

        Ok(Self {
            inner: Arc::new(ShippingClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                origin_city_id: config.origin_city_id.clone(),
                item_weight_grams: config.item_weight_grams,
                cache,
            }),
        })
    }

    /// Warehouse city used when a quote names no origin.
    #[must_use]
    pub fn origin_city_id(&self) -> &str {
        &self.inner.origin_city_id
    }

    /// Total parcel weight for `items` units.
    #[must_use]
    pub fn parcel_weight(&self, items: u32) -> u32 {
        self.inner.item_weight_grams.saturating_mul(items.max(1))
    }

    /// All provinces.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn provinces(&self) -> Result<Vec<Province>, ShippingError> {
        let cache_key = "provinces".to_owned();
        if let Some(CacheValue::Provinces(provinces)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for provinces");
            return Ok(provinces);
        }

        let provinces: Vec<Province> = self.get("/province", &[]).await?;
        self.inner
            .cache
            .insert(cache_key, CacheValue::Provinces(provinces.clone()))
            .await;
        Ok(provinces)
    }

    /// Cities of a province.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn cities(&self, province_id: &str) -> Result<Vec<City>, ShippingError> {
        let cache_key = format!("cities:{province_id}");
        if let Some(CacheValue::Cities(cities)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for cities");
            return Ok(cities);
        }

        let cities: Vec<City> = self.get("/city", &[("province", province_id)]).await?;
        self.inner
            .cache
            .insert(cache_key, CacheValue::Cities(cities.clone()))
            .await;
        Ok(cities)
    }

    /// Quote every service a courier offers between two cities.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, request), fields(destination = %request.destination, courier = %request.courier))]
    pub async fn cost(&self, request: &CostRequest) -> Result<Vec<CourierCosts>, ShippingError> {
        let url = format!("{}/cost", self.inner.base_url);
        let form = CostForm {
            origin: request.origin.as_deref().unwrap_or(&self.inner.origin_city_id),
            destination: &request.destination,
            weight: request.weight,
            courier: &request.courier,
        };
        let response = self.inner.client.post(&url).form(&form).send().await?;
        self.handle_response(response).await
    }

    /// Price of one named service for a route.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::ServiceUnavailable` if the courier does not offer
    /// `service` for this route.
    pub async fn quote(
        &self,
        request: &CostRequest,
        service: &str,
    ) -> Result<ServiceQuote, ShippingError> {
        let couriers = self.cost(request).await?;
        find_service(&couriers, service)
            .ok_or_else(|| ShippingError::ServiceUnavailable(format!("{} {service}", request.courier)))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ShippingError> {
        let url = Url::parse_with_params(&format!("{}{path}", self.inner.base_url), query)
            .map_err(|e| ShippingError::Parse(format!("Invalid URL: {e}")))?;
        let response = self.inner.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Unwrap the `rajaongkir.results` envelope.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ShippingError> {
        let status = response.status();

        if status.is_success() {
            let envelope: Envelope<T> = response
                .json()
                .await
                .map_err(|e| ShippingError::Parse(format!("Failed to parse response: {e}")))?;
            return Ok(envelope.rajaongkir.results);
        }

        Err(self.parse_error(response).await)
    }

    async fn parse_error(&self, response: reqwest::Response) -> ShippingError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return ShippingError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return ShippingError::Unauthorized;
        }

        // Errors carry a description in the same envelope.
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.rajaongkir.status.description,
            Err(_) => "Unknown error".to_string(),
        };

        ShippingError::Api { status, message }
    }
}

impl std::fmt::Debug for ShippingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingClient")
            .field("base_url", &self.inner.base_url)
            .field("origin_city_id", &self.inner.origin_city_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client() -> ShippingClient {
        ShippingClient::new(&ShippingConfig {
            api_key: SecretString::from("ro-key-7Hq2pL"),
            base_url: "https://api.rajaongkir.com/starter/".to_owned(),
            origin_city_id: "501".to_owned(),
            item_weight_grams: 1000,
        })
        .unwrap()
    }

    #[test]
    fn test_base_url_is_trimmed() {
        assert_eq!(client().inner.base_url, "https://api.rajaongkir.com/starter");
    }

    #[test]
    fn test_parcel_weight() {
        let client = client();
        assert_eq!(client.parcel_weight(3), 3000);
        assert_eq!(client.parcel_weight(0), 1000);
        assert_eq!(client.parcel_weight(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_debug_hides_key() {
        assert!(!format!("{:?}", client()).contains("ro-key-7Hq2pL"));
    }
}
