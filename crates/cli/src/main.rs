//! Warung CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! warung-cli migrate
//!
//! # Grant or revoke the admin role
//! warung-cli user promote --email owner@example.com
//! warung-cli user demote --email former@example.com
//!
//! # Seed categories (bundled defaults or a YAML file)
//! warung-cli seed categories
//! warung-cli seed categories --file categories.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use warung_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "warung-cli")]
#[command(author, version, about = "Warung CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user roles
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Give a user the admin role
    Promote {
        /// Email the user signed in with
        #[arg(short, long)]
        email: String,
    },
    /// Return an admin to the user role
    Demote {
        /// Email the user signed in with
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert categories that do not exist yet
    Categories {
        /// YAML file to read instead of the bundled defaults
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Promote { email } => {
                commands::user::set_role(&email, UserRole::Admin).await?;
            }
            UserAction::Demote { email } => {
                commands::user::set_role(&email, UserRole::User).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Categories { file } => {
                commands::seed::categories(file.as_deref()).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_promote() {
        let cli = Cli::try_parse_from(["warung-cli", "user", "promote", "--email", "a@b.co"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Promote { .. }
            })
        ));
    }
}
