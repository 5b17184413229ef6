//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use warung_core::{Email, Rupiah, UserId, UserRole};

/// A shop user mirrored from the identity provider.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    /// Identity provider subject.
    #[serde(skip_serializing)]
    pub external_id: String,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated caller, as seen by handlers.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub image_url: Option<String>,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            image_url: user.image_url,
        }
    }
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// A customer row in the admin users table.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub image_url: Option<String>,
    /// Paid revenue from this customer.
    pub total_spent: Rupiah,
    pub paid_orders: i64,
    pub created_at: DateTime<Utc>,
}

/// Values the identity provider sends for a user.
#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub external_id: String,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub image_url: Option<String>,
}
