//! Order repository.
//!
//! Orders are written as `pending` at checkout and settled by payment
//! gateway notifications. Settlement runs once per order: every transition
//! out of `pending` is guarded by `WHERE status = 'pending'`, so redelivered
//! notifications are no-ops.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use warung_core::{
    AddressId, CursorPage, Limit, OrderId, OrderStatus, PageRequest, ProductId, Rating, ReviewId,
    Rupiah, TimeCursor, UserId,
};

use super::RepositoryError;
use crate::models::{
    AdminOrder, CustomerOrder, CustomerOrderItem, NewOrder, Order, Review, SalesSummary,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    address_id: Option<Uuid>,
    delivery_address: String,
    courier: String,
    courier_service: String,
    items_amount: i64,
    shipping_amount: i64,
    gross_amount: i64,
    status: OrderStatus,
    has_paid: bool,
    payment_type: Option<String>,
    currency: Option<String>,
    transaction_time: DateTime<Utc>,
    settlement_time: Option<DateTime<Utc>>,
    stock_shortfall: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: UserId::new(row.user_id),
            address_id: row.address_id.map(AddressId::new),
            delivery_address: row.delivery_address,
            courier: row.courier,
            courier_service: row.courier_service,
            items_amount: Rupiah::new(row.items_amount),
            shipping_amount: Rupiah::new(row.shipping_amount),
            gross_amount: Rupiah::new(row.gross_amount),
            status: row.status,
            has_paid: row.has_paid,
            payment_type: row.payment_type,
            currency: row.currency,
            transaction_time: row.transaction_time,
            settlement_time: row.settlement_time,
            stock_shortfall: row.stock_shortfall,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerOrderItemRow {
    order_id: Uuid,
    product_id: Option<Uuid>,
    product_name: String,
    unit_price: i64,
    quantity: i32,
    image_url: Option<String>,
    review_id: Option<Uuid>,
    review_rating: Option<i16>,
    review_description: Option<String>,
    review_created_at: Option<DateTime<Utc>>,
    review_updated_at: Option<DateTime<Utc>>,
}

impl CustomerOrderItemRow {
    fn into_item(self, user_id: UserId) -> Result<(Uuid, CustomerOrderItem), RepositoryError> {
        let my_review = match (
            self.review_id,
            self.product_id,
            self.review_rating,
            self.review_created_at,
            self.review_updated_at,
        ) {
            (Some(id), Some(product_id), Some(rating), Some(created_at), Some(updated_at)) => {
                Some(Review {
                    id: ReviewId::new(id),
                    user_id,
                    product_id: ProductId::new(product_id),
                    rating: Rating::new(i64::from(rating)).map_err(|e| {
                        RepositoryError::DataCorruption(format!("review {id}: {e}"))
                    })?,
                    description: self.review_description,
                    created_at,
                    updated_at,
                })
            }
            _ => None,
        };

        Ok((
            self.order_id,
            CustomerOrderItem {
                product_id: self.product_id.map(ProductId::new),
                product_name: self.product_name,
                unit_price: Rupiah::new(self.unit_price),
                quantity: self.quantity,
                image_url: self.image_url,
                my_review,
            },
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminOrderRow {
    id: Uuid,
    order_number: String,
    buyer_name: String,
    buyer_email: String,
    item_names: Vec<String>,
    gross_amount: i64,
    status: OrderStatus,
    has_paid: bool,
    stock_shortfall: bool,
    courier: String,
    created_at: DateTime<Utc>,
}

impl From<AdminOrderRow> for AdminOrder {
    fn from(row: AdminOrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            buyer_name: row.buyer_name,
            buyer_email: row.buyer_email,
            item_names: row.item_names,
            gross_amount: Rupiah::new(row.gross_amount),
            status: row.status,
            has_paid: row.has_paid,
            stock_shortfall: row.stock_shortfall,
            courier: row.courier,
            created_at: row.created_at,
        }
    }
}

/// Items whose stock a settlement decrements. Product rows are locked in id
/// order so concurrent settlements cannot deadlock.
const SETTLED_ITEMS: &str = "SELECT product_id, quantity FROM shop.order_items \
     WHERE order_id = $1 AND product_id IS NOT NULL ORDER BY product_id";

const ORDER_COLUMNS: &str = "id, order_number, user_id, address_id, delivery_address, courier, \
     courier_service, items_amount, shipping_amount, gross_amount, status, has_paid, \
     payment_type, currency, transaction_time, settlement_time, stock_shortfall, created_at, \
     updated_at";

/// Payment details reported by the gateway for a settled order.
#[derive(Debug, Clone, Default)]
pub struct PaymentDetails {
    pub payment_type: Option<String>,
    pub currency: Option<String>,
    pub settlement_time: Option<DateTime<Utc>>,
}

/// Result of applying a gateway notification to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The order left `pending` now.
    Applied {
        /// Some item could not be covered by stock.
        stock_shortfall: bool,
    },
    /// The order had already left `pending`.
    AlreadySettled(OrderStatus),
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write a pending order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Rejected` if the amounts overflow.
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    pub async fn create_pending(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let (Some(items_amount), Some(gross_amount)) = (order.items_amount(), order.gross_amount())
        else {
            return Err(RepositoryError::Rejected("order total is too large".to_owned()));
        };

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.orders (
                order_number, user_id, address_id, delivery_address, courier, courier_service,
                items_amount, shipping_amount, gross_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(&order.delivery_address)
        .bind(&order.courier)
        .bind(&order.courier_service)
        .bind(items_amount)
        .bind(order.shipping_amount)
        .bind(gross_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "order number already exists"))?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO shop.order_items (order_id, product_id, product_name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    /// Remove an order that never reached the gateway.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_pending(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.orders WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Find an order by its gateway reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Settle a pending order as paid.
    ///
    /// In one transaction: record the payment, take each item's quantity
    /// from stock (only when enough is left), add it to the sold count, and
    /// drop the purchased products from the buyer's cart. Items that stock
    /// cannot cover flag the order with `stock_shortfall`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this number.
    pub async fn mark_paid(
        &self,
        order_number: &str,
        payment: &PaymentDetails,
    ) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let settled: Option<(Uuid, Uuid)> = sqlx::query_as(
            r"
            UPDATE shop.orders
            SET status = 'paid',
                has_paid = TRUE,
                payment_type = $2,
                currency = $3,
                settlement_time = COALESCE($4, NOW()),
                updated_at = NOW()
            WHERE order_number = $1 AND status = 'pending'
            RETURNING id, user_id
            ",
        )
        .bind(order_number)
        .bind(payment.payment_type.as_deref())
        .bind(payment.currency.as_deref())
        .bind(payment.settlement_time)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((order_id, user_id)) = settled else {
            drop(tx);
            return self.current_status(order_number).await.map(Settlement::AlreadySettled);
        };

        let items: Vec<(Uuid, i32)> = sqlx::query_as(SETTLED_ITEMS)
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

        let mut stock_shortfall = false;
        for (product_id, quantity) in &items {
            let result = sqlx::query(
                r"
                UPDATE shop.products
                SET stock = stock - $2, sold_count = sold_count + $2, updated_at = NOW()
                WHERE id = $1 AND stock >= $2
                ",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(
                    order_number,
                    %product_id,
                    quantity,
                    "Stock does not cover paid item; flagging order for reconciliation"
                );
                stock_shortfall = true;
            }
        }

        if stock_shortfall {
            sqlx::query("UPDATE shop.orders SET stock_shortfall = TRUE WHERE id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        let product_ids: Vec<Uuid> = items.iter().map(|(id, _)| *id).collect();
        sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(user_id)
            .bind(&product_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(order_number, stock_shortfall, "Order paid");
        Ok(Settlement::Applied { stock_shortfall })
    }

    /// Move a pending order to a terminal failure status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this number.
    pub async fn mark_failed(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<Settlement, RepositoryError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r"
            UPDATE shop.orders SET status = $2, updated_at = NOW()
            WHERE order_number = $1 AND status = 'pending'
            RETURNING id
            ",
        )
        .bind(order_number)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        if updated.is_some() {
            info!(order_number, %status, "Order payment failed");
            return Ok(Settlement::Applied {
                stock_shortfall: false,
            });
        }
        self.current_status(order_number)
            .await
            .map(Settlement::AlreadySettled)
    }

    async fn current_status(&self, order_number: &str) -> Result<OrderStatus, RepositoryError> {
        sqlx::query_scalar("SELECT status FROM shop.orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// The user's paid orders, newest first, with items and the user's own
    /// review of each product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn my_orders(
        &self,
        user_id: UserId,
        cursor: Option<TimeCursor>,
        limit: Limit,
    ) -> Result<CursorPage<CustomerOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.orders
            WHERE user_id = $1 AND has_paid
              AND ($2::TIMESTAMPTZ IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "
        ))
        .bind(user_id)
        .bind(cursor.map(|c| c.at))
        .bind(cursor.map(|c| c.id))
        .bind(limit.fetch())
        .fetch_all(self.pool)
        .await?;

        let page = CursorPage::from_overfetch(rows, limit, |row| {
            TimeCursor::new(row.created_at, row.id).encode()
        });

        let order_ids: Vec<Uuid> = page.items.iter().map(|row| row.id).collect();
        let item_rows = sqlx::query_as::<_, CustomerOrderItemRow>(
            r"
            SELECT oi.order_id, oi.product_id, oi.product_name, oi.unit_price, oi.quantity,
                   p.image_url,
                   r.id AS review_id, r.rating AS review_rating,
                   r.description AS review_description,
                   r.created_at AS review_created_at, r.updated_at AS review_updated_at
            FROM shop.order_items oi
            LEFT JOIN shop.products p ON p.id = oi.product_id
            LEFT JOIN shop.reviews r ON r.product_id = oi.product_id AND r.user_id = $2
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.created_at, oi.id
            ",
        )
        .bind(&order_ids)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<CustomerOrderItem>> = HashMap::new();
        for row in item_rows {
            let (order_id, item) = row.into_item(user_id)?;
            items.entry(order_id).or_default().push(item);
        }

        Ok(page.map(|row| CustomerOrder {
            items: items.remove(&row.id).unwrap_or_default(),
            id: OrderId::new(row.id),
            order_number: row.order_number,
            status: row.status,
            courier: row.courier,
            courier_service: row.courier_service,
            items_amount: Rupiah::new(row.items_amount),
            shipping_amount: Rupiah::new(row.shipping_amount),
            gross_amount: Rupiah::new(row.gross_amount),
            delivery_address: row.delivery_address,
            settlement_time: row.settlement_time,
            created_at: row.created_at,
        }))
    }

    /// Admin table page, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_admin(&self, page: PageRequest) -> Result<(Vec<AdminOrder>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, AdminOrderRow>(
            r"
            SELECT o.id, o.order_number, o.gross_amount, o.status, o.has_paid,
                   o.stock_shortfall, o.courier, o.created_at,
                   u.name AS buyer_name, u.email AS buyer_email,
                   COALESCE(
                       ARRAY_AGG(oi.product_name ORDER BY oi.created_at, oi.id)
                           FILTER (WHERE oi.id IS NOT NULL),
                       '{}'
                   ) AS item_names
            FROM shop.orders o
            JOIN shop.users u ON u.id = o.user_id
            LEFT JOIN shop.order_items oi ON oi.order_id = o.id
            GROUP BY o.id, u.name, u.email
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders")
            .fetch_one(self.pool)
            .await?;

        Ok((rows.into_iter().map(AdminOrder::from).collect(), total))
    }

    /// Move an order along its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Rejected` if the transition is not allowed.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: OrderStatus =
            sqlx::query_scalar("SELECT status FROM shop.orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::Rejected(format!(
                "cannot change order status from {current} to {next}"
            )));
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.orders SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Count and revenue of paid orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_summary(&self) -> Result<SalesSummary, RepositoryError> {
        let (total_orders, total_amount): (i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*), COALESCE(SUM(gross_amount), 0)::BIGINT
            FROM shop.orders WHERE has_paid
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(SalesSummary {
            total_orders,
            total_amount: Rupiah::new(total_amount),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_items_are_locked_in_product_order() {
        assert!(SETTLED_ITEMS.ends_with("ORDER BY product_id"));
        assert!(SETTLED_ITEMS.contains("product_id IS NOT NULL"));
    }
}
