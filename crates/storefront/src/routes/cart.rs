//! Cart route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use warung_core::ProductId;
use warung_core::pagination::CursorPage;

use super::CursorQuery;
use crate::db::CartRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::CartLine;
use crate::state::AppState;

/// Add to cart body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

/// Result of adding a product.
#[derive(Debug, Serialize)]
pub struct AddToCartResponse {
    /// `false` when the product was already in the cart.
    pub added: bool,
}

/// Line quantity after a change.
#[derive(Debug, Serialize)]
pub struct QuantityResponse {
    pub quantity: i32,
}

/// Whether a product is in the cart.
#[derive(Debug, Serialize)]
pub struct ContainsResponse {
    pub in_cart: bool,
}

/// Cart lines, newest first.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<CursorQuery>,
) -> Result<Json<CursorPage<CartLine>>> {
    let (cursor, limit) = query.parse()?;
    let page = CartRepository::new(state.pool())
        .list(user.id, cursor, limit)
        .await?;
    Ok(Json(page))
}

/// Put one unit of a product in the cart.
#[instrument(skip(state, user))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<AddToCartResponse>)> {
    let added = CartRepository::new(state.pool())
        .add(user.id, request.product_id)
        .await?;

    let product_id = request.product_id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", &product_id)]));

    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(AddToCartResponse { added })))
}

/// One more unit, up to the available stock.
#[instrument(skip(state, user))]
pub async fn increase(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<QuantityResponse>> {
    let quantity = CartRepository::new(state.pool())
        .increase(user.id, product_id)
        .await?;
    Ok(Json(QuantityResponse { quantity }))
}

/// One unit fewer, never below one.
#[instrument(skip(state, user))]
pub async fn decrease(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<QuantityResponse>> {
    let quantity = CartRepository::new(state.pool())
        .decrease(user.id, product_id)
        .await?;
    Ok(Json(QuantityResponse { quantity }))
}

/// Drop a product from the cart.
#[instrument(skip(state, user))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Whether the product is in the caller's cart; `false` for anonymous callers.
#[instrument(skip(state, user))]
pub async fn contains(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<ContainsResponse>> {
    let in_cart = match user {
        Some(user) => {
            CartRepository::new(state.pool())
                .contains(user.id, product_id)
                .await?
        }
        None => false,
    };
    Ok(Json(ContainsResponse { in_cart }))
}
