//! CLI subcommand implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use thiserror::Error;

use warung_core::EmailError;
use warung_storefront::db::RepositoryError;
use warung_storefront::models::ValidationError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Users are created by the identity webhook on first sign-in.
    #[error("No user with email {0}; they need to sign in once first")]
    UnknownUser(String),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    SeedFile(#[from] serde_yaml::Error),

    #[error("Invalid category {name}: {source}")]
    InvalidCategory {
        name: String,
        source: ValidationError,
    },
}

/// Database URL from `WARUNG_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("WARUNG_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("WARUNG_DATABASE_URL"))
}
