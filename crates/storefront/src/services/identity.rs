//! Identity provider webhook handling.
//!
//! Users sign up and sign in with the identity provider. Its `user.*`
//! events keep `shop.users` in step: created users are inserted once,
//! updates overwrite the local copy (inserting it if the create was missed),
//! and deletes remove the user and everything that cascades from it.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use warung_core::{Email, EmailError, UserRole};

use crate::db::{RepositoryError, UserRepository};
use crate::models::IdentityProfile;

/// Errors that can occur while applying an identity event.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The event payload does not match its type.
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The user has no email address.
    #[error("user has no email address")]
    MissingEmail,

    /// The user's primary email is not valid.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Raw webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    public_metadata: Option<PublicMetadata>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct PublicMetadata {
    /// Free-form; only the exact string `admin` grants the admin role.
    #[serde(default)]
    role: serde_json::Value,
}

impl PublicMetadata {
    fn role(&self) -> UserRole {
        match self.role.as_str() {
            Some("admin") => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeletedData {
    id: String,
}

/// A parsed identity event.
#[derive(Debug, Clone)]
pub enum IdentityChange {
    Created(IdentityProfile),
    Updated(IdentityProfile),
    Deleted { external_id: String },
    /// An event type this service does not act on.
    Other(String),
}

impl IdentityEvent {
    /// Interpret the event.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if a `user.*` payload is malformed.
    pub fn parse(self) -> Result<IdentityChange, IdentityError> {
        match self.kind.as_str() {
            "user.created" => {
                let data: UserData = serde_json::from_value(self.data)?;
                // New sign-ups are always customers.
                Ok(IdentityChange::Created(profile(data, UserRole::User)?))
            }
            "user.updated" => {
                let data: UserData = serde_json::from_value(self.data)?;
                let role = data
                    .public_metadata
                    .as_ref()
                    .map_or(UserRole::User, PublicMetadata::role);
                Ok(IdentityChange::Updated(profile(data, role)?))
            }
            "user.deleted" => {
                let data: DeletedData = serde_json::from_value(self.data)?;
                Ok(IdentityChange::Deleted {
                    external_id: data.id,
                })
            }
            _ => Ok(IdentityChange::Other(self.kind)),
        }
    }
}

fn profile(data: UserData, role: UserRole) -> Result<IdentityProfile, IdentityError> {
    let email = data
        .email_addresses
        .first()
        .ok_or(IdentityError::MissingEmail)?;
    let email = Email::parse(&email.email_address)?;

    let name = [data.first_name.as_deref(), data.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let name = if name.is_empty() {
        email.as_str().split('@').next().unwrap_or_default().to_owned()
    } else {
        name
    };

    Ok(IdentityProfile {
        external_id: data.id,
        email,
        name,
        role,
        image_url: data.image_url.filter(|url| !url.trim().is_empty()),
    })
}

/// Applies identity events to `shop.users`.
pub struct IdentityService<'a> {
    users: UserRepository<'a>,
}

impl<'a> IdentityService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the payload is malformed or the write fails.
    #[instrument(skip(self, event), fields(kind = %event.kind))]
    pub async fn apply(&self, event: IdentityEvent) -> Result<(), IdentityError> {
        match event.parse()? {
            IdentityChange::Created(profile) => {
                let inserted = self.users.insert_if_missing(&profile).await?;
                info!(external_id = %profile.external_id, inserted, "User created");
            }
            IdentityChange::Updated(profile) => {
                let user = self.users.upsert(&profile).await?;
                info!(user_id = %user.id, role = %user.role, "User updated");
            }
            IdentityChange::Deleted { external_id } => {
                let deleted = self.users.delete_by_external_id(&external_id).await?;
                info!(%external_id, deleted, "User deleted");
            }
            IdentityChange::Other(kind) => {
                info!(%kind, "Ignoring identity event");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(json: &str) -> IdentityEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_created_user_is_a_customer() {
        let change = event(
            r#"{"type":"user.created","data":{
                "id":"user_2abc","first_name":"Budi","last_name":"Santoso",
                "image_url":"https://img.example.com/budi.png",
                "email_addresses":[{"email_address":"budi@example.co.id"},
                                   {"email_address":"budi.alt@example.co.id"}],
                "public_metadata":{"role":"admin"}}}"#,
        )
        .parse()
        .unwrap();

        let IdentityChange::Created(profile) = change else {
            panic!("expected a created user");
        };
        assert_eq!(profile.external_id, "user_2abc");
        assert_eq!(profile.name, "Budi Santoso");
        assert_eq!(profile.email.as_str(), "budi@example.co.id");
        assert_eq!(profile.role, UserRole::User);
    }

    #[test]
    fn test_updated_user_takes_role_from_metadata() {
        let change = event(
            r#"{"type":"user.updated","data":{
                "id":"user_2abc","first_name":"Budi","last_name":null,
                "email_addresses":[{"email_address":"budi@example.co.id"}],
                "public_metadata":{"role":"admin"}}}"#,
        )
        .parse()
        .unwrap();

        let IdentityChange::Updated(profile) = change else {
            panic!("expected an updated user");
        };
        assert_eq!(profile.name, "Budi");
        assert_eq!(profile.role, UserRole::Admin);
    }

    #[test]
    fn test_unrecognised_roles_fall_back_to_customer() {
        for role in [
            r#""moderator""#,
            r#""""#,
            r#""Admin""#,
            "42",
            "null",
            r#"["admin"]"#,
        ] {
            let payload = format!(
                r#"{{"type":"user.updated","data":{{
                    "id":"user_2abc","first_name":"Budi",
                    "email_addresses":[{{"email_address":"budi@example.co.id"}}],
                    "public_metadata":{{"role":{role}}}}}}}"#
            );
            let change = event(&payload).parse().unwrap();

            let IdentityChange::Updated(profile) = change else {
                panic!("expected an updated user for role {role}");
            };
            assert_eq!(profile.role, UserRole::User, "role {role}");
        }
    }

    #[test]
    fn test_null_metadata_is_a_customer() {
        let change = event(
            r#"{"type":"user.updated","data":{"id":"user_2abc",
                "email_addresses":[{"email_address":"budi@example.co.id"}],
                "public_metadata":null}}"#,
        )
        .parse()
        .unwrap();
        let IdentityChange::Updated(profile) = change else {
            panic!("expected an updated user");
        };
        assert_eq!(profile.role, UserRole::User);
    }

    #[test]
    fn test_name_falls_back_to_email() {
        let change = event(
            r#"{"type":"user.updated","data":{"id":"user_2abc",
                "email_addresses":[{"email_address":"rina@example.co.id"}]}}"#,
        )
        .parse()
        .unwrap();
        let IdentityChange::Updated(profile) = change else {
            panic!("expected an updated user");
        };
        assert_eq!(profile.name, "rina");
        assert_eq!(profile.role, UserRole::User);
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let result = event(r#"{"type":"user.created","data":{"id":"user_2abc"}}"#).parse();
        assert!(matches!(result, Err(IdentityError::MissingEmail)));
    }

    #[test]
    fn test_deleted_and_other_events() {
        let change = event(r#"{"type":"user.deleted","data":{"id":"user_2abc","deleted":true}}"#)
            .parse()
            .unwrap();
        assert!(matches!(change, IdentityChange::Deleted { external_id } if external_id == "user_2abc"));

        let change = event(r#"{"type":"session.created","data":{}}"#).parse().unwrap();
        assert!(matches!(change, IdentityChange::Other(kind) if kind == "session.created"));
    }
}
