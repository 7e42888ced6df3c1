//! Order models.
//!
//! An order is a snapshot of a cart at checkout time. After creation only
//! two things ever change: the status (one transition, driven by the payment
//! webhook) and the assigned-secrets columns on each line (populated at most
//! once, by the fulfillment engine).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use keyhaven_core::{Buyer, OrderId, OrderItemId, OrderStatus, ProductId};

/// An order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: Buyer,
    pub total_amount: Decimal,
    /// Our generated reference (`ORDER-<uuid>`), sent to the provider as its
    /// `order_id` and echoed back in the IPN.
    pub payment_reference: String,
    /// Provider-issued invoice identifier.
    pub invoice_id: String,
    /// Provider-hosted payment page the buyer is redirected to.
    pub invoice_url: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A credential pair as delivered to a buyer (no `used` flag; the order is
/// the sole owner of the secret once withdrawn from the pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredCredential {
    pub username: String,
    pub secret: String,
}

/// One line of an order: the purchase snapshot plus, after fulfillment, the
/// withdrawn secrets.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    /// Price captured at purchase time (unlike cart lines, never re-read).
    pub unit_price: Decimal,
    /// Gift-card codes assigned during fulfillment, in pool order.
    pub assigned_codes: Vec<String>,
    /// Account credentials assigned during fulfillment, in pool order.
    pub assigned_credentials: Vec<DeliveredCredential>,
}

impl OrderLine {
    /// Whether fulfillment stamped any secrets onto this line.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        !self.assigned_codes.is_empty() || !self.assigned_credentials.is_empty()
    }
}
