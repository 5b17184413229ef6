//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! warung-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `WARUNG_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded at
//! compile time.

use tracing::info;

use warung_storefront::db;

use super::{CommandError, database_url};

/// Run the storefront migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
