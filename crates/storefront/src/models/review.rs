//! Review model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use keyhaven_core::{ProductId, ReviewId, UserId};

/// A product review. One row per (user, product), gated by a completed
/// order containing the product.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// 1-5 stars.
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
