//! Review handlers: purchase-gated creation, owner-only edits.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use keyhaven_core::{ProductId, ReviewId};

use crate::db::{OrderRepository, ProductRepository, RepositoryError, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Review;
use crate::state::AppState;

/// Request body for creating or updating a review.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: String,
}

fn validate_rating(rating: i16) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }
    Ok(())
}

/// `GET /products/{id}/reviews` - a product's reviews, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(ProductId::new(id))
        .await?;
    Ok(Json(reviews))
}

/// `POST /products/{id}/reviews` - add a review.
///
/// Gated on a completed order containing the product; one review per
/// (user, product).
#[tracing::instrument(skip(state, user, request))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    validate_rating(request.rating)?;
    let product_id = ProductId::new(id);

    if ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let purchased = OrderRepository::new(state.pool())
        .has_completed_purchase(user.id, product_id)
        .await?;
    if !purchased {
        return Err(AppError::Unauthorized(
            "reviews require a completed purchase of the product".into(),
        ));
    }

    let review = ReviewRepository::new(state.pool())
        .create(user.id, product_id, request.rating, &request.comment)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(m) => AppError::Conflict(m),
            e => AppError::Database(e),
        })?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// `PUT /reviews/{id}` - edit one's own review.
#[tracing::instrument(skip(state, user, request))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(request): Json<ReviewRequest>,
) -> Result<StatusCode> {
    validate_rating(request.rating)?;

    ReviewRepository::new(state.pool())
        .update(ReviewId::new(id), user.id, request.rating, &request.comment)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /reviews/{id}` - delete a review; authors their own, admins any.
#[tracing::instrument(skip(state, user))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    ReviewRepository::new(state.pool())
        .delete(ReviewId::new(id), user.id, user.is_admin)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
