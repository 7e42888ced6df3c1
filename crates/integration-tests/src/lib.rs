//! Integration tests for Keyhaven.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and run migrations
//! cargo run -p keyhaven-cli -- migrate
//!
//! # Start the storefront (for the HTTP tests)
//! cargo run -p keyhaven-storefront
//!
//! # Run integration tests
//! cargo test -p keyhaven-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `storefront_api` - HTTP tests against a running storefront
//! - `fulfillment_db` - Database tests for the claim/fulfillment paths

use reqwest::Client;
use secrecy::SecretString;
use sqlx::PgPool;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("KEYHAVEN_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A cookie-holding client; the session cookie carries cart and login state.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the test database (`KEYHAVEN_DATABASE_URL` or `DATABASE_URL`).
///
/// # Panics
///
/// Panics if no database URL is configured or the connection fails.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("KEYHAVEN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("KEYHAVEN_DATABASE_URL or DATABASE_URL must be set for integration tests");

    keyhaven_storefront::db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database")
}
