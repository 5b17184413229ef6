//! Dashboard chart series.
//!
//! Days are UTC calendar days. Sales are attributed to the day the payment
//! settled; new customers to the day they signed up.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use warung_core::{DateRange, Rupiah};

use super::RepositoryError;

/// Products shown in the revenue chart.
const TOP_PRODUCTS: i64 = 10;

/// Paid revenue on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total_sales: Rupiah,
}

/// Sign-ups on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyCustomers {
    pub date: NaiveDate,
    pub total_users: i64,
}

/// Paid revenue of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ProductRevenue {
    pub name: String,
    pub revenue: Rupiah,
}

/// Repository for dashboard analytics.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Paid revenue per day within the range.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_day(&self, range: &DateRange) -> Result<Vec<DailySales>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailySales>(
            r"
            SELECT (settlement_time AT TIME ZONE 'UTC')::DATE AS date,
                   SUM(gross_amount)::BIGINT AS total_sales
            FROM shop.orders
            WHERE has_paid
              AND ($1::TIMESTAMPTZ IS NULL OR settlement_time >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR settlement_time < $2)
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Customer sign-ups per day within the range.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn new_customers_by_day(
        &self,
        range: &DateRange,
    ) -> Result<Vec<DailyCustomers>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailyCustomers>(
            r"
            SELECT (created_at AT TIME ZONE 'UTC')::DATE AS date,
                   COUNT(*) AS total_users
            FROM shop.users
            WHERE role = 'user'
              AND ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Best-earning products within the range, highest revenue first.
    ///
    /// Grouped by the name snapshot so deleted products still count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_by_product(
        &self,
        range: &DateRange,
    ) -> Result<Vec<ProductRevenue>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRevenue>(
            r"
            SELECT oi.product_name AS name,
                   SUM(oi.unit_price * oi.quantity)::BIGINT AS revenue
            FROM shop.order_items oi
            JOIN shop.orders o ON o.id = oi.order_id
            WHERE o.has_paid
              AND ($1::TIMESTAMPTZ IS NULL OR o.settlement_time >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR o.settlement_time < $2)
            GROUP BY oi.product_name
            ORDER BY revenue DESC, name
            LIMIT $3
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .bind(TOP_PRODUCTS)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
