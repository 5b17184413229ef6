//! Checkout and order history route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use warung_core::pagination::CursorPage;

use super::CursorQuery;
use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::CustomerOrder;
use crate::services::{CheckoutRequest, CheckoutResponse, CheckoutService};
use crate::state::AppState;

/// Place an order for the caller's cart and open a payment session.
///
/// # Errors
///
/// Returns 400 for an empty cart, insufficient stock or an unavailable
/// courier service, 404 for someone else's address, and 502 when the payment
/// gateway or shipping API fails.
#[instrument(skip(state, user, request))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let service = CheckoutService::new(
        state.pool(),
        state.payment(),
        state.shipping(),
        &state.config().base_url,
    );
    Ok(Json(service.checkout(&user, &request).await?))
}

/// The caller's paid orders, newest first.
#[instrument(skip(state, user))]
pub async fn my_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<CursorQuery>,
) -> Result<Json<CursorPage<CustomerOrder>>> {
    let (cursor, limit) = query.parse()?;
    let page = OrderRepository::new(state.pool())
        .my_orders(user.id, cursor, limit)
        .await?;
    Ok(Json(page))
}
