//! Address repository.
//!
//! Every mutation keeps the "at most one main address per user" rule:
//! the owning user row is locked with `SELECT ... FOR UPDATE`, the previous
//! main is cleared, then the new main is written, all inside one transaction.
//! The partial unique index `addresses_one_main_per_user` backs this up and
//! surfaces as [`RepositoryError::Conflict`].

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use warung_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, NewAddress};

/// Non-main addresses shown next to the main one.
const OTHERS_LIMIT: i64 = 2;

const MAIN_CONFLICT: &str = "another main address was set concurrently";

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    receiver_name: String,
    phone_number: String,
    label: String,
    province: String,
    province_id: String,
    city: String,
    city_id: String,
    subdistrict: String,
    postal_code: String,
    complete_address: String,
    is_main: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            receiver_name: row.receiver_name,
            phone_number: row.phone_number,
            label: row.label,
            province: row.province,
            province_id: row.province_id,
            city: row.city,
            city_id: row.city_id,
            subdistrict: row.subdistrict,
            postal_code: row.postal_code,
            complete_address: row.complete_address,
            is_main: row.is_main,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, receiver_name, phone_number, label, province, \
     province_id, city, city_id, subdistrict, postal_code, complete_address, is_main, \
     created_at, updated_at";

/// Repository for shipping addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All addresses of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// The user's main address, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn main(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses WHERE user_id = $1 AND is_main"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Up to two non-main addresses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn others(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses
             WHERE user_id = $1 AND NOT is_main
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(OTHERS_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// A single address, only if owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_owned(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.addresses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Create an address. It becomes main when requested or when it is the
    /// user's first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the main-address index rejects
    /// the write.
    pub async fn create(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.addresses WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_main = address.is_main || existing == 0;

        if is_main {
            clear_main(&mut tx, user_id, None).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO shop.addresses (
                user_id, receiver_name, phone_number, label, province, province_id,
                city, city_id, subdistrict, postal_code, complete_address, is_main
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&address.receiver_name)
        .bind(&address.phone_number)
        .bind(&address.label)
        .bind(&address.province)
        .bind(&address.province_id)
        .bind(&address.city)
        .bind(&address.city_id)
        .bind(&address.subdistrict)
        .bind(&address.postal_code)
        .bind(&address.complete_address)
        .bind(is_main)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, MAIN_CONFLICT))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace an owned address.
    ///
    /// Setting `is_main` clears the previous main. Clearing it on the current
    /// main leaves the user without one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not owned by the
    /// user.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let owned: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM shop.addresses WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(RepositoryError::NotFound);
        }

        if address.is_main {
            clear_main(&mut tx, user_id, Some(id)).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE shop.addresses
            SET receiver_name = $3,
                phone_number = $4,
                label = $5,
                province = $6,
                province_id = $7,
                city = $8,
                city_id = $9,
                subdistrict = $10,
                postal_code = $11,
                complete_address = $12,
                is_main = $13,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&address.receiver_name)
        .bind(&address.phone_number)
        .bind(&address.label)
        .bind(&address.province)
        .bind(&address.province_id)
        .bind(&address.city)
        .bind(&address.city_id)
        .bind(&address.subdistrict)
        .bind(&address.postal_code)
        .bind(&address.complete_address)
        .bind(address.is_main)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, MAIN_CONFLICT))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete an owned address. Deleting the main address promotes the most
    /// recently created remaining one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not owned by the
    /// user.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let was_main: Option<bool> = sqlx::query_scalar(
            "DELETE FROM shop.addresses WHERE id = $1 AND user_id = $2 RETURNING is_main",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_main {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE shop.addresses SET is_main = TRUE, updated_at = NOW()
                    WHERE id = (
                        SELECT id FROM shop.addresses
                        WHERE user_id = $1
                        ORDER BY created_at DESC, id DESC
                        LIMIT 1
                    )
                    ",
                )
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::on_unique_violation(e, MAIN_CONFLICT))?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Serialize address mutations for one user.
async fn lock_user(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    let locked: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM shop.users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    locked.map(|_| ()).ok_or(RepositoryError::NotFound)
}

/// Clear the user's main flag, except on `keep`.
async fn clear_main(
    conn: &mut PgConnection,
    user_id: UserId,
    keep: Option<AddressId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE shop.addresses SET is_main = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND is_main AND ($2::UUID IS NULL OR id <> $2)
        ",
    )
    .bind(user_id)
    .bind(keep)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
