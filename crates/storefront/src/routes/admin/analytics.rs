//! Dashboard chart handlers.
//!
//! Each chart takes either `?range=<preset>` or `?from=YYYY-MM-DD&to=YYYY-MM-DD`
//! and defaults to the last seven days.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use warung_core::analytics::DateRange;

use crate::db::AnalyticsRepository;
use crate::db::analytics::{DailyCustomers, DailySales, ProductRevenue};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub range: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RangeQuery {
    fn resolve(&self) -> Result<DateRange> {
        Ok(DateRange::from_params(
            self.range.as_deref(),
            self.from.as_deref(),
            self.to.as_deref(),
            Utc::now(),
        )?)
    }
}

/// Chart rows with the label of the window they cover.
#[derive(Debug, Serialize)]
pub struct Chart<T> {
    pub range: DateRange,
    pub data: Vec<T>,
}

#[instrument(skip(state, _admin))]
pub async fn sales(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Chart<DailySales>>> {
    let range = query.resolve()?;
    let data = AnalyticsRepository::new(state.pool())
        .sales_by_day(&range)
        .await?;
    Ok(Json(Chart { range, data }))
}

#[instrument(skip(state, _admin))]
pub async fn customers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Chart<DailyCustomers>>> {
    let range = query.resolve()?;
    let data = AnalyticsRepository::new(state.pool())
        .new_customers_by_day(&range)
        .await?;
    Ok(Json(Chart { range, data }))
}

#[instrument(skip(state, _admin))]
pub async fn products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Chart<ProductRevenue>>> {
    let range = query.resolve()?;
    let data = AnalyticsRepository::new(state.pool())
        .revenue_by_product(&range)
        .await?;
    Ok(Json(Chart { range, data }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_range_query_defaults_and_errors() {
        let range = RangeQuery::default().resolve().unwrap();
        assert!(range.start.is_some());

        let bad = RangeQuery {
            range: Some("forever".to_owned()),
            ..RangeQuery::default()
        };
        assert!(matches!(bad.resolve(), Err(AppError::BadRequest(_))));

        let inverted = RangeQuery {
            range: None,
            from: Some("2025-02-01".to_owned()),
            to: Some("2025-01-01".to_owned()),
        };
        assert!(matches!(inverted.resolve(), Err(AppError::BadRequest(_))));
    }
}
