//! User role management commands.
//!
//! # Usage
//!
//! ```bash
//! warung-cli user promote --email owner@example.com
//! warung-cli user demote --email former@example.com
//! ```
//!
//! The identity webhook also writes roles from the provider's public
//! metadata, so a later profile update there can override a change made here.

use tracing::info;

use warung_core::{Email, UserRole};
use warung_storefront::db::{self, UserRepository};

use super::{CommandError, database_url};

/// Set the role of an existing user.
///
/// # Errors
///
/// Returns `CommandError::InvalidEmail` for malformed addresses and
/// `CommandError::UnknownUser` if nobody has signed in with that email.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), CommandError> {
    let email = Email::parse(email)?;
    let database_url = database_url()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    let updated = UserRepository::new(&pool)
        .set_role_by_email(&email, role)
        .await?;
    if updated == 0 {
        return Err(CommandError::UnknownUser(email.as_str().to_owned()));
    }

    info!(email = %email.as_str(), %role, "Role updated");
    Ok(())
}
