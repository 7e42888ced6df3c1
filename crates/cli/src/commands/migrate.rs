//! Database migration command.
//!
//! Migrations are embedded from `crates/storefront/migrations/` at compile
//! time; the server never runs them on startup.

use super::CliError;

/// Run the storefront database migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
