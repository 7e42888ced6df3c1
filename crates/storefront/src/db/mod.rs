//! Database operations for the storefront `PostgreSQL` database.
//!
//! # Tables (schema `storefront`)
//!
//! - `user` - Buyer accounts (auth handled by the auth collaborator)
//! - `product` - Catalog entries with the stock counter
//! - `gift_code` / `account_credential` - Private single-use inventory pools
//! - `cart` / `cart_item` - One cart per identity, one line per product
//! - `orders` / `order_item` - Checkout snapshots plus assigned secrets
//! - `review` - One review per (user, product)
//! - `tower_sessions.session` - Session storage (managed by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p keyhaven-cli -- migrate
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as` with `FromRow` structs)
//! rather than macro-checked, so the workspace builds without a live
//! database.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod carts;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

/// Errors from repository operations.
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

    /// Constraint violation (e.g., duplicate review).
    #[error("constraint violation: {0}")]
    Conflict(String),
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

/// Map a sqlx error to `Conflict` when it is a unique violation.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}
