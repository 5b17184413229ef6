//! User repository.
//!
//! Users are created and updated only through identity provider webhooks;
//! the storefront never stores credentials.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use warung_core::{Email, PageRequest, Rupiah, UserId, UserRole};

use super::RepositoryError;
use crate::models::{Customer, IdentityProfile, User};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    external_id: String,
    email: String,
    name: String,
    role: UserRole,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            external_id: row.external_id,
            email,
            name: row.name,
            role: row.role,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: String,
    image_url: Option<String>,
    total_spent: i64,
    paid_orders: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            image_url: row.image_url,
            total_spent: Rupiah::new(row.total_spent),
            paid_orders: row.paid_orders,
            created_at: row.created_at,
        })
    }
}

/// Customer totals for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CustomersSummary {
    /// Users with the `user` role.
    pub users_count: i64,
    /// Average paid revenue per paying customer, rounded to whole rupiah.
    pub avg_amount: Decimal,
}

const USER_COLUMNS: &str = "id, external_id, email, name, role, image_url, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by identity provider subject.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a user from a `user.created` event.
    ///
    /// Redelivered events are no-ops; returns `false` when the user already
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_if_missing(&self, profile: &IdentityProfile) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO shop.users (external_id, email, name, role, image_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO NOTHING
            ",
        )
        .bind(&profile.external_id)
        .bind(profile.email.as_str())
        .bind(&profile.name)
        .bind(profile.role)
        .bind(profile.image_url.as_deref())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Apply a `user.updated` event, inserting the user if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, profile: &IdentityProfile) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO shop.users (external_id, email, name, role, image_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE
            SET email = EXCLUDED.email,
                name = EXCLUDED.name,
                role = EXCLUDED.role,
                image_url = EXCLUDED.image_url,
                updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&profile.external_id)
        .bind(profile.email.as_str())
        .bind(&profile.name)
        .bind(profile.role)
        .bind(profile.image_url.as_deref())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Delete a user by identity provider subject. Returns `false` if no such
    /// user existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.users WHERE external_id = $1")
            .bind(external_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Change the role of every user with this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this email.
    pub async fn set_role_by_email(&self, email: &Email, role: UserRole) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.users SET role = $2, updated_at = NOW() WHERE email = $1",
        )
        .bind(email.as_str())
        .bind(role)
        .execute(self.pool)
        .await?;

        match result.rows_affected() {
            0 => Err(RepositoryError::NotFound),
            n => Ok(n),
        }
    }

    /// Customers (role `user`), newest first, optionally filtered by name.
    ///
    /// Returns the page and the total matching the same filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_customers(
        &self,
        page: PageRequest,
        q: Option<&str>,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        let pattern = q.map(|q| format!("%{}%", escape_like(q)));

        let rows = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT u.id, u.name, u.email, u.image_url, u.created_at,
                   COALESCE(SUM(o.gross_amount), 0)::BIGINT AS total_spent,
                   COUNT(o.id) AS paid_orders
            FROM shop.users u
            LEFT JOIN shop.orders o ON o.user_id = u.id AND o.has_paid
            WHERE u.role = 'user'
              AND ($1::TEXT IS NULL OR u.name ILIKE $1)
            GROUP BY u.id
            ORDER BY u.created_at DESC, u.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(pattern.as_deref())
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM shop.users
            WHERE role = 'user' AND ($1::TEXT IS NULL OR name ILIKE $1)
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let customers = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((customers, total))
    }

    /// Customer count and average paid revenue per paying customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customers_summary(&self) -> Result<CustomersSummary, RepositoryError> {
        let (users_count, avg_amount): (i64, Option<Decimal>) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM shop.users WHERE role = 'user'),
                (SELECT ROUND(AVG(per_customer.total), 0)
                 FROM (
                     SELECT SUM(gross_amount) AS total
                     FROM shop.orders
                     WHERE has_paid
                     GROUP BY user_id
                 ) per_customer)
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(CustomersSummary {
            users_count,
            avg_amount: avg_amount.unwrap_or(Decimal::ZERO),
        })
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("kopi"), "kopi");
        assert_eq!(escape_like("100%_asli\\"), "100\\%\\_asli\\\\");
    }
}
