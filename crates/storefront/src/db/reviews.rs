//! Review repository. One review per user and product.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use warung_core::{ProductId, Rating, ReviewId, UserId};

use super::RepositoryError;
use crate::models::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    rating: i16,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating))
            .map_err(|e| RepositoryError::DataCorruption(format!("review {}: {e}", row.id)))?;
        Ok(Self {
            id: ReviewId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            rating,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const REVIEW_COLUMNS: &str = "id, user_id, product_id, rating, description, created_at, updated_at";

/// Repository for reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Review a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Rejected` if the user already reviewed it.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: Rating,
        description: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            INSERT INTO shop.reviews (user_id, product_id, rating, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::Rejected("you have already reviewed this product".to_owned())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        row.try_into()
    }

    /// Replace the user's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no review of it.
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: Rating,
        description: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            UPDATE shop.reviews SET rating = $3, description = $4, updated_at = NOW()
            WHERE user_id = $1 AND product_id = $2
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(description)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// The user's review of a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mine(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM shop.reviews WHERE user_id = $1 AND product_id = $2"
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
