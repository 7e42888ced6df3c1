//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use keyhaven_core::ProductId;

use crate::db::{ProductRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::models::{ProductListing, Review};
use crate::state::AppState;

/// Product detail response: listing plus its reviews.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub listing: ProductListing,
    pub reviews: Vec<Review>,
}

/// `GET /products` - list the catalog with computed availability.
#[tracing::instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<ProductListing>>> {
    let products = ProductRepository::new(state.pool()).list().await?;
    Ok(Json(products))
}

/// `GET /products/{id}` - one product with availability and reviews.
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductDetail>> {
    let id = ProductId::new(id);

    let listing = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(id)
        .await?;

    Ok(Json(ProductDetail { listing, reviews }))
}
