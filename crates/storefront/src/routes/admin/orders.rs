//! Order management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use warung_core::pagination::{OffsetPage, PageInfo};
use warung_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{AdminOrder, Order, SalesSummary};
use crate::routes::PageQuery;
use crate::state::AppState;

/// Status change body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// Orders, newest first.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<OffsetPage<AdminOrder>>> {
    let request = query.request()?;
    let (items, total) = OrderRepository::new(state.pool())
        .list_admin(request)
        .await?;
    Ok(Json(OffsetPage {
        items,
        info: PageInfo::new(total, request),
    }))
}

/// Paid order count and revenue.
#[instrument(skip(state, _admin))]
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<SalesSummary>> {
    Ok(Json(OrderRepository::new(state.pool()).sales_summary().await?))
}

/// Move an order along its fulfilment path.
///
/// # Errors
///
/// Returns 400 for statuses only the payment gateway may set and for
/// transitions the lifecycle does not allow, 404 for unknown orders.
#[instrument(skip(state, admin))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    check_admin_status(update.status)?;
    let order = OrderRepository::new(state.pool())
        .update_status(id, update.status)
        .await?;
    info!(admin_id = %admin.id, order_id = %id, status = %update.status, "Order status changed");
    Ok(Json(order))
}

fn check_admin_status(status: OrderStatus) -> Result<()> {
    if status.is_set_by_gateway() {
        return Err(AppError::BadRequest(format!(
            "status {status} is set by the payment gateway"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_cannot_set_gateway_statuses() {
        assert!(check_admin_status(OrderStatus::Paid).is_err());
        assert!(check_admin_status(OrderStatus::Pending).is_err());
        assert!(check_admin_status(OrderStatus::Shipped).is_ok());
        assert!(check_admin_status(OrderStatus::Cancelled).is_ok());
    }
}
