//! Product management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use warung_core::ProductId;
use warung_core::pagination::{OffsetPage, PageInfo};

use crate::db::ProductRepository;
use crate::db::products::ActivityCounts;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{AdminProduct, ProductInput};
use crate::routes::PageQuery;
use crate::state::AppState;

/// Products, newest first, optionally filtered by name.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<OffsetPage<AdminProduct>>> {
    let request = query.request()?;
    let (items, total) = ProductRepository::new(state.pool())
        .list_admin(request, query.search())
        .await?;
    Ok(Json(OffsetPage {
        items,
        info: PageInfo::new(total, request),
    }))
}

/// Active and archived product counts.
#[instrument(skip(state, _admin))]
pub async fn activity(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<ActivityCounts>> {
    Ok(Json(ProductRepository::new(state.pool()).activity_counts().await?))
}

#[instrument(skip(state, admin, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<AdminProduct>)> {
    let product = input.validate()?;
    let created = ProductRepository::new(state.pool()).create(&product).await?;
    info!(admin_id = %admin.id, product_id = %created.id, "Product created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, admin, input))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<AdminProduct>> {
    let product = input.validate()?;
    let updated = ProductRepository::new(state.pool())
        .update(id, &product)
        .await?;
    info!(admin_id = %admin.id, product_id = %id, "Product updated");
    Ok(Json(updated))
}

/// Delete a product. Order snapshots keep their copy of its name and price.
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;
    info!(admin_id = %admin.id, product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
