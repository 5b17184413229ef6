//! Customer listing handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use warung_core::pagination::{OffsetPage, PageInfo};

use crate::db::UserRepository;
use crate::db::users::CustomersSummary;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Customer;
use crate::routes::PageQuery;
use crate::state::AppState;

/// Customers, newest first, optionally filtered by name.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<OffsetPage<Customer>>> {
    let request = query.request()?;
    let (items, total) = UserRepository::new(state.pool())
        .list_customers(request, query.search())
        .await?;
    Ok(Json(OffsetPage {
        items,
        info: PageInfo::new(total, request),
    }))
}

/// Customer count and average paid revenue per paying customer.
#[instrument(skip(state, _admin))]
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<CustomersSummary>> {
    Ok(Json(UserRepository::new(state.pool()).customers_summary().await?))
}
