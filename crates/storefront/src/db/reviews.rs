//! Review repository. One review per (user, product), enforced by a unique
//! index; the purchase gate lives in the route layer via
//! `OrderRepository::has_completed_purchase`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use keyhaven_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Review;

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: i16,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            INSERT INTO storefront.review (user_id, product_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, product_id, rating, comment, created_at
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .bind(rating)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product already reviewed"))?;

        Ok(Review::from(row))
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT id, user_id, product_id, rating, comment, created_at
            FROM storefront.review
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// A product's reviews, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT id, user_id, product_id, rating, comment, created_at
            FROM storefront.review
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(product_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// Update the author's own review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist or
    /// belongs to someone else.
    pub async fn update(
        &self,
        id: ReviewId,
        user_id: UserId,
        rating: i16,
        comment: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.review
            SET rating = $3, comment = $4
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .bind(rating)
        .bind(comment)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a review. Admins may delete anyone's; authors only their own.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing matched.
    pub async fn delete(
        &self,
        id: ReviewId,
        requester: UserId,
        is_admin: bool,
    ) -> Result<(), RepositoryError> {
        let result = if is_admin {
            sqlx::query("DELETE FROM storefront.review WHERE id = $1")
                .bind(id.as_i32())
                .execute(self.pool)
                .await?
        } else {
            sqlx::query("DELETE FROM storefront.review WHERE id = $1 AND user_id = $2")
                .bind(id.as_i32())
                .bind(requester.as_i32())
                .execute(self.pool)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
