//! Cart repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use warung_core::{CartItemId, CursorPage, Limit, ProductId, Rupiah, TimeCursor, UserId};

use super::RepositoryError;
use crate::models::{CartLine, CartProduct};

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    product_id: Uuid,
    product_name: String,
    price: i64,
    image_url: Option<String>,
    stock: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            quantity: row.quantity,
            created_at: row.created_at,
            product: CartProduct {
                id: ProductId::new(row.product_id),
                name: row.product_name,
                price: Rupiah::new(row.price),
                image_url: row.image_url,
                stock: row.stock,
            },
        }
    }
}

const LINE_SELECT: &str = r"
    SELECT ci.id, ci.quantity, ci.created_at,
           p.id AS product_id, p.name AS product_name, p.price, p.image_url, p.stock
    FROM shop.cart_items ci
    JOIN shop.products p ON p.id = ci.product_id
";

/// Repository for cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of the cart, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        cursor: Option<TimeCursor>,
        limit: Limit,
    ) -> Result<CursorPage<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(&format!(
            r"
            {LINE_SELECT}
            WHERE ci.user_id = $1
              AND ($2::TIMESTAMPTZ IS NULL OR (ci.created_at, ci.id) < ($2, $3))
            ORDER BY ci.created_at DESC, ci.id DESC
            LIMIT $4
            "
        ))
        .bind(user_id)
        .bind(cursor.map(|c| c.at))
        .bind(cursor.map(|c| c.id))
        .bind(limit.fetch())
        .fetch_all(self.pool)
        .await?;

        let lines: Vec<CartLine> = rows.into_iter().map(Into::into).collect();
        Ok(CursorPage::from_overfetch(lines, limit, |line| {
            TimeCursor::new(line.created_at, line.id.as_uuid()).encode()
        }))
    }

    /// Every line in the cart whose product is still for sale, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(&format!(
            r"
            {LINE_SELECT}
            WHERE ci.user_id = $1 AND NOT p.is_archived
            ORDER BY ci.created_at, ci.id
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Put one unit of a product in the cart. Adding a product that is
    /// already there changes nothing; returns whether a line was created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown or archived products.
    /// Returns `RepositoryError::Rejected` when the product is out of stock.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let stock: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM shop.products WHERE id = $1 AND NOT is_archived")
                .bind(product_id)
                .fetch_optional(self.pool)
                .await?;

        match stock {
            None => return Err(RepositoryError::NotFound),
            Some(stock) if stock < 1 => {
                return Err(RepositoryError::Rejected("product is out of stock".to_owned()));
            }
            Some(_) => {}
        }

        let result = sqlx::query(
            r"
            INSERT INTO shop.cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Add one unit, up to the product's stock. Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    /// Returns `RepositoryError::Rejected` if stock is exhausted.
    pub async fn increase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE shop.cart_items ci
            SET quantity = ci.quantity + 1, updated_at = NOW()
            FROM shop.products p
            WHERE ci.user_id = $1 AND ci.product_id = $2
              AND p.id = ci.product_id AND ci.quantity < p.stock
            RETURNING ci.quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        match quantity {
            Some(quantity) => Ok(quantity),
            None if self.contains(user_id, product_id).await? => Err(RepositoryError::Rejected(
                "not enough stock for another unit".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Remove one unit. A line never drops below 1; use [`Self::remove`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    /// Returns `RepositoryError::Rejected` if the quantity is already 1.
    pub async fn decrease(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE shop.cart_items
            SET quantity = quantity - 1, updated_at = NOW()
            WHERE user_id = $1 AND product_id = $2 AND quantity > 1
            RETURNING quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        match quantity {
            Some(quantity) => Ok(quantity),
            None if self.contains(user_id, product_id).await? => Err(RepositoryError::Rejected(
                "quantity cannot go below 1".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it was not in the cart.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Whether the product is in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.cart_items WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
