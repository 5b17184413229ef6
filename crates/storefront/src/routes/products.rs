//! Product and review route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use warung_core::ProductId;
use warung_core::pagination::{CursorPage, Limit, ProductCursor, ProductSort};

use crate::db::{ProductRepository, ReviewRepository};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::{
    ProductDetail, ProductFilters, ProductSummary, Review, ReviewInput, StockFilter,
};
use crate::state::AppState;

/// Products per page when the client does not ask for a size.
const DEFAULT_LIMIT: usize = 12;

/// Query parameters of the public listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub stock: Option<StockFilter>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub q: Option<String>,
    /// `newest | lowest_price | higher_price | best`.
    pub sort: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Public product listing, keyset paginated.
///
/// # Errors
///
/// Returns 400 for malformed cursors, cursors from another sort, or invalid
/// filters, and 404 for unknown category slugs.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<CursorPage<ProductSummary>>> {
    let sort = ProductSort::from_param(query.sort.as_deref());
    let cursor = query
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| ProductCursor::decode(c, sort))
        .transpose()?;
    let limit = Limit::new(query.limit, DEFAULT_LIMIT)?;

    let filters = ProductFilters {
        min_price: query.min_price,
        max_price: query.max_price,
        stock: query.stock,
        category: query.category,
        subcategory: query.subcategory,
        q: query.q,
    }
    .validate()?;

    let page = ProductRepository::new(state.pool())
        .list_public(filters, sort, cursor, limit)
        .await?;
    Ok(Json(page))
}

/// Product page with reviews.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    Ok(Json(ProductRepository::new(state.pool()).get_one(id).await?))
}

/// The caller's review of a product, or `null`.
#[instrument(skip(state, user))]
pub async fn my_review(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<ProductId>,
) -> Result<Json<Option<Review>>> {
    let Some(user) = user else {
        return Ok(Json(None));
    };
    Ok(Json(ReviewRepository::new(state.pool()).mine(user.id, id).await?))
}

/// Review a product. One review per user and product.
#[instrument(skip(state, user, input))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ProductId>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = ReviewRepository::new(state.pool())
        .create(user.id, id, input.rating, input.description().as_deref())
        .await?;

    let product_id = id.to_string();
    add_breadcrumb("review", "Created review", Some(&[("product_id", &product_id)]));

    Ok((StatusCode::CREATED, Json(review)))
}

/// Change the caller's review of a product.
#[instrument(skip(state, user, input))]
pub async fn update_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ProductId>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<Review>> {
    let review = ReviewRepository::new(state.pool())
        .update(user.id, id, input.rating, input.description().as_deref())
        .await?;
    Ok(Json(review))
}
