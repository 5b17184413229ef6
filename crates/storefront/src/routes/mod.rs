//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database)
//!
//! # Session
//! GET  /api/auth/session                    - Current user or null
//!
//! # Catalog
//! GET  /api/categories/parents              - Top-level categories
//! GET  /api/categories/tree                 - Categories with subcategories
//! GET  /api/categories/all                  - Every category as {id, name}
//! GET  /api/products                        - Keyset product listing
//! GET  /api/products/{id}                   - Product with reviews
//! GET  /api/products/{id}/reviews/mine      - Caller's review or null
//! POST /api/products/{id}/reviews           - Create review
//! PUT  /api/products/{id}/reviews           - Update review
//!
//! # Addresses (requires auth for mutations)
//! GET  /api/addresses                       - All addresses, newest first
//! GET  /api/addresses/main                  - Main address or null
//! GET  /api/addresses/others                - Up to two non-main addresses
//! POST /api/addresses                       - Create
//! PUT  /api/addresses/{id}                  - Update
//! DELETE /api/addresses/{id}                - Delete
//!
//! # Cart (requires auth)
//! GET  /api/cart                            - Keyset cart listing
//! POST /api/cart                            - Add product
//! DELETE /api/cart/{product_id}             - Remove product
//! POST /api/cart/{product_id}/increase      - Quantity + 1
//! POST /api/cart/{product_id}/decrease      - Quantity - 1
//! GET  /api/cart/contains/{product_id}      - Whether the product is in the cart
//!
//! # Checkout and orders (requires auth)
//! POST /api/checkout                        - Place order, start payment
//! GET  /api/orders                          - Paid order history
//!
//! # Shipping
//! GET  /api/shipping/provinces
//! GET  /api/shipping/cities?province_id=
//! POST /api/shipping/cost
//!
//! # Webhooks
//! POST /api/webhooks/payment                - Payment gateway notification
//! POST /api/webhooks/identity               - Identity provider user events
//!
//! # Admin (requires admin role), see [`admin`]
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod products;
pub mod shipping;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::Deserialize;

use warung_core::pagination::{Limit, PageRequest, TimeCursor};

use crate::error::AppError;
use crate::state::AppState;

/// Keyset paging parameters for customer feeds.
#[derive(Debug, Default, Deserialize)]
pub struct CursorQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

impl CursorQuery {
    /// Rows per page when the client does not ask for a size.
    pub const DEFAULT_LIMIT: usize = 10;

    /// Parse the cursor and limit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed cursors or out-of-range limits.
    pub fn parse(&self) -> Result<(Option<TimeCursor>, Limit), AppError> {
        let cursor = self
            .cursor
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(TimeCursor::decode)
            .transpose()?;
        let limit = Limit::new(self.limit, Self::DEFAULT_LIMIT)?;
        Ok((cursor, limit))
    }
}

/// Offset paging parameters for admin tables.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Name search.
    pub q: Option<String>,
}

impl PageQuery {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for out-of-range values.
    pub fn request(&self) -> Result<PageRequest, AppError> {
        Ok(PageRequest::new(self.page, self.page_size)?)
    }

    /// Search term with blanks treated as absent.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/parents", get(categories::parents))
        .route("/tree", get(categories::tree))
        .route("/all", get(categories::all))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews/mine", get(products::my_review))
        .route(
            "/{id}/reviews",
            post(products::create_review).put(products::update_review),
        )
}

fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route("/main", get(addresses::main))
        .route("/others", get(addresses::others))
        .route(
            "/{id}",
            put(addresses::update).delete(addresses::delete),
        )
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::index).post(cart::add))
        .route("/{product_id}", delete(cart::remove))
        .route("/{product_id}/increase", post(cart::increase))
        .route("/{product_id}/decrease", post(cart::decrease))
        .route("/contains/{product_id}", get(cart::contains))
}

fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/provinces", get(shipping::provinces))
        .route("/cities", get(shipping::cities))
        .route("/cost", post(shipping::cost))
}

/// Inbound third-party callbacks, rate limited separately by the binary.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/payment", post(webhooks::payment))
        .route("/identity", post(webhooks::identity))
}

/// Every JSON API route except webhooks.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/session", get(auth::session))
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/addresses", address_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::checkout))
        .route("/orders", get(checkout::my_orders))
        .nest("/shipping", shipping_routes())
        .nest("/admin", admin::routes())
}

/// Health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
