//! Category management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use warung_core::CategoryId;
use warung_core::pagination::{OffsetPage, PageInfo, PageRequest};

use crate::db::CategoryRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{AdminCategory, Category, CategoryInput, CategoryKind};
use crate::state::AppState;

/// Admin category table parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(default)]
    pub kind: CategoryKind,
}

/// Categories, optionally only parents or only subcategories.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<OffsetPage<AdminCategory>>> {
    let request = PageRequest::new(query.page, query.page_size)?;
    let (items, total) = CategoryRepository::new(state.pool())
        .list_admin(request, query.kind)
        .await?;
    Ok(Json(OffsetPage {
        items,
        info: PageInfo::new(total, request),
    }))
}

#[instrument(skip(state, admin, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = input.validate()?;
    let created = CategoryRepository::new(state.pool())
        .create(&category)
        .await?;
    info!(admin_id = %admin.id, category_id = %created.id, "Category created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, admin, input))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let category = input.validate()?;
    let updated = CategoryRepository::new(state.pool())
        .update(id, &category)
        .await?;
    info!(admin_id = %admin.id, category_id = %id, "Category updated");
    Ok(Json(updated))
}

/// Delete a category and its subcategories. Fails with 409 while products
/// still reference it.
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    info!(admin_id = %admin.id, category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
