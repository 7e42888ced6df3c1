//! Keyhaven CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! kh-cli migrate
//!
//! # Grant admin rights to a user (created if absent)
//! kh-cli admin grant -e admin@example.com
//!
//! # Seed a demo catalog with sample pools
//! kh-cli seed
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kh-cli")]
#[command(author, version, about = "Keyhaven CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database with a demo catalog
    Seed,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant the admin flag to a user, creating the account if needed
    Grant {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke the admin flag from a user
    Revoke {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { email } => commands::admin::set_admin(&email, true).await?,
            AdminAction::Revoke { email } => commands::admin::set_admin(&email, false).await?,
        },
        Commands::Seed => commands::seed::run().await?,
    }
    Ok(())
}
