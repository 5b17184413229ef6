//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Provides rate limiters for different endpoint categories:
//! - `api_rate_limiter`: general JSON API (~100/min per client)
//! - `webhook_rate_limiter`: inbound gateway and identity callbacks (~300/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor that trusts the reverse proxy's client-IP headers and
/// falls back to the socket peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req).ok_or(GovernorError::UnableToExtractKey)
    }
}

fn client_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();

    // First hop of X-Forwarded-For is the original client
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for the JSON API: ~100 requests per minute per IP.
///
/// Configuration: 1 request per second (replenish), burst of 50.
///
/// # Panics
///
/// This function will not panic. `per_second(1)` and `burst_size(50)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for webhooks: replenishes 5 per second, burst of 100.
///
/// Gateways retry in bursts from a handful of addresses, so this is looser
/// than the API limit.
///
/// # Panics
///
/// This function will not panic. `per_millisecond(200)` and
/// `burst_size(100)` are always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn webhook_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_millisecond(200)
        .burst_size(100)
        .finish()
        .expect("rate limiter config with per_millisecond(200) and burst_size(100) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/api/products")
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let req = request()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2")
            .header("x-real-ip", "10.0.0.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = request().body(()).unwrap();
        assert_eq!(client_ip(&req), None);

        let peer: SocketAddr = "198.51.100.4:51234".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&req), Some(peer.ip()));
    }
}
