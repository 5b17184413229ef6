//! Warung storefront library.
//!
//! The JSON API behind the shop UI and the admin console, exposed as a
//! library so the binary and the integration tests build the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    api_rate_limiter, request_id_middleware, security_headers_middleware, webhook_rate_limiter,
};
use crate::state::AppState;

/// Build the application router without rate limiting.
pub fn build_router(state: AppState) -> Router {
    assemble(state, routes::api_routes(), routes::webhook_routes())
}

/// Build the application router with per-client rate limits.
///
/// Clients are keyed by proxy headers or the socket peer address, so serve
/// it with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_rate_limited_router(state: AppState) -> Router {
    assemble(
        state,
        routes::api_routes().layer(api_rate_limiter()),
        routes::webhook_routes().layer(webhook_rate_limiter()),
    )
}

fn assemble(state: AppState, api: Router<AppState>, webhooks: Router<AppState>) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .nest("/api", api.nest("/webhooks", webhooks))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
