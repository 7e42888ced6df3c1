//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use keyhaven_core::{Email, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: UserId::new(row.id),
            email,
            is_admin: row.is_admin,
            created_at: row.created_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, is_admin, created_at
            FROM storefront.user
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, is_admin, created_at
            FROM storefront.user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, email: &Email) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.user (email)
            VALUES ($1)
            RETURNING id, email, is_admin, created_at
            ",
        )
        .bind(email.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        User::try_from(row)
    }

    /// Grant or revoke the admin flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has that email.
    pub async fn set_admin(&self, email: &Email, is_admin: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET is_admin = $1
            WHERE email = $2
            ",
        )
        .bind(is_admin)
        .bind(email.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
