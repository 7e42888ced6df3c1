//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session
//! carries two things: the signed-in user (if any) and the guest cart token.

use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "kh_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The sessions table must already exist (created via migration).
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The session's guest cart token, minting one on first access.
///
/// The token is the guest half of a cart's owning identity; it never leaves
/// the session, which is why guest carts can only be cleared from a request
/// that carries the session.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn cart_token(session: &Session) -> Result<Uuid, tower_sessions::session::Error> {
    if let Some(token) = session.get::<Uuid>(session_keys::CART_TOKEN).await? {
        return Ok(token);
    }

    let token = Uuid::new_v4();
    session.insert(session_keys::CART_TOKEN, token).await?;
    Ok(token)
}
