//! Product model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use keyhaven_core::{ProductCategory, ProductId};

/// A catalog product.
///
/// For pooled categories (giftcard/account) the `stock` counter is *not*
/// authoritative - true availability is the count of unused pool entries,
/// surfaced via [`ProductListing::available`]. The counter is kept in step
/// with pool claims inside the fulfillment transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
    pub category: ProductCategory,
    /// Stock counter; authoritative only for non-pooled categories.
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

/// A product together with its computed availability.
///
/// `available` is pool-derived for pooled categories and the stock counter
/// otherwise; it is what cart operations validate quantities against.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    /// Units a buyer can actually be served right now.
    pub available: i64,
}
