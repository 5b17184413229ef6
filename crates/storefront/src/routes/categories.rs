//! Public category route handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::CategoryRepository;
use crate::error::Result;
use crate::models::{Category, CategoryRef, CategoryTree};
use crate::state::AppState;

/// Top-level categories.
#[instrument(skip(state))]
pub async fn parents(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).parents().await?))
}

/// Top-level categories with their subcategories, for navigation.
#[instrument(skip(state))]
pub async fn tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryTree>>> {
    Ok(Json(CategoryRepository::new(state.pool()).tree().await?))
}

/// Every category as `{id, name}`.
#[instrument(skip(state))]
pub async fn all(State(state): State<AppState>) -> Result<Json<Vec<CategoryRef>>> {
    Ok(Json(CategoryRepository::new(state.pool()).all().await?))
}
