//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository error.
    #[error("{0}")]
    Repository(#[from] keyhaven_storefront::db::RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Invalid pool input.
    #[error("Invalid pool input: {0}")]
    InvalidPool(#[from] keyhaven_core::PoolParseError),
}

/// Connect to the storefront database using the server's URL resolution
/// (`KEYHAVEN_DATABASE_URL`, falling back to `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("KEYHAVEN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("KEYHAVEN_DATABASE_URL"))?;

    let pool = keyhaven_storefront::db::create_pool(&SecretString::from(url)).await?;
    Ok(pool)
}
