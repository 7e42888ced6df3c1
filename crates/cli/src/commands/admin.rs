//! Admin user management.

use keyhaven_core::Email;
use keyhaven_storefront::db::UserRepository;

use super::CliError;

/// Grant or revoke the admin flag for a user, creating the account when
/// granting to an email with no user yet.
///
/// # Errors
///
/// Returns `CliError` on an invalid email, a missing user (revoke), or a
/// database failure.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::InvalidEmail(e.to_string()))?;

    let pool = super::connect().await?;
    let repo = UserRepository::new(&pool);

    if is_admin && repo.get_by_email(&email).await?.is_none() {
        repo.create(&email).await?;
        tracing::info!(email = %email, "User created");
    }

    repo.set_admin(&email, is_admin).await?;

    tracing::info!(email = %email, is_admin, "Admin flag updated");
    Ok(())
}
