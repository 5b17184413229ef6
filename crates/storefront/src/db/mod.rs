//! Database operations for the storefront `PostgreSQL` database.
//!
//! # Schema: `shop`
//!
//! ## Tables
//!
//! - `users` - Customers and admins mirrored from the identity provider
//! - `addresses` - Shipping addresses (at most one `is_main` per user)
//! - `categories` - Product categories, one level of nesting
//! - `products` - Catalog with stock and sold counters
//! - `cart_items` - One line per (user, product)
//! - `orders` / `order_items` - Purchases with product snapshots
//! - `reviews` - One review per (user, product)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p warung-cli -- migrate
//! ```

pub mod addresses;
pub mod analytics;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use analytics::AnalyticsRepository;
pub use cart::CartRepository;
pub use categories::CategoryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The data forbids the operation (e.g., out of stock). The message is
    /// safe to show to clients.
    #[error("{0}")]
    Rejected(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict` with the given message.
    pub(crate) fn on_unique_violation(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign key violation to `Conflict` with the given message.
    pub(crate) fn on_foreign_key_violation(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
