//! Order repository.
//!
//! Orders are created in `pending` as a full snapshot of the cart, then
//! transition exactly once, driven by the payment webhook. The
//! `claim_completion` conditional update is the idempotency gate for the
//! whole fulfillment path: whichever webhook delivery wins the row flip
//! performs the pool withdrawals, every other delivery sees zero rows
//! affected and backs off.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use keyhaven_core::{
    Buyer, Email, OrderId, OrderItemId, OrderStatus, ProductCategory, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::{CartView, DeliveredCredential, Order, OrderLine};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    guest_email: Option<String>,
    total_amount: Decimal,
    payment_reference: String,
    invoice_id: String,
    invoice_url: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let buyer = match (row.user_id, row.guest_email) {
            (Some(id), None) => Buyer::User {
                id: UserId::new(id),
            },
            (None, Some(email)) => Buyer::Guest {
                email: Email::parse(&email).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid guest email: {e}"))
                })?,
            },
            _ => {
                return Err(RepositoryError::DataCorruption(
                    "order has neither or both of user_id and guest_email".to_owned(),
                ));
            }
        };
        let status = OrderStatus::from_str(&row.status).map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: OrderId::new(row.id),
            buyer,
            total_amount: row.total_amount,
            payment_reference: row.payment_reference,
            invoice_id: row.invoice_id,
            invoice_url: row.invoice_url,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    assigned_codes: Vec<String>,
    assigned_credentials: serde_json::Value,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let assigned_credentials: Vec<DeliveredCredential> =
            serde_json::from_value(row.assigned_credentials).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid assigned credentials: {e}"))
            })?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            assigned_codes: row.assigned_codes,
            assigned_credentials,
        })
    }
}

/// One line as read by the fulfillment engine, with the product category
/// resolved so the engine knows which pool (if any) to draw from.
#[derive(Debug, Clone)]
pub struct FulfillmentLine {
    pub item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub category: ProductCategory,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending order snapshotting the given cart view.
    ///
    /// Names and unit prices are copied from the view, so later catalog
    /// edits never change what the buyer agreed to pay.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn create(
        &self,
        buyer: &Buyer,
        cart: &CartView,
        payment_reference: &str,
        invoice_id: &str,
        invoice_url: &str,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO storefront.orders
                (user_id, guest_email, total_amount, payment_reference,
                 invoice_id, invoice_url, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING id, user_id, guest_email, total_amount,
                      payment_reference, invoice_id, invoice_url,
                      status, created_at
            ",
        )
        .bind(buyer.user_id().map(UserId::as_i32))
        .bind(buyer.guest_email().map(Email::as_str))
        .bind(cart.total())
        .bind(payment_reference)
        .bind(invoice_id)
        .bind(invoice_url)
        .fetch_one(&mut *tx)
        .await?;

        for line in &cart.lines {
            sqlx::query(
                r"
                INSERT INTO storefront.order_item
                    (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(row.id)
            .bind(line.product_id.as_i32())
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Order::try_from(row)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, guest_email, total_amount, payment_reference,
                   invoice_id, invoice_url, status, created_at
            FROM storefront.orders
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Look up an order by the reference we handed the payment provider.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, guest_email, total_amount, payment_reference,
                   invoice_id, invoice_url, status, created_at
            FROM storefront.orders
            WHERE payment_reference = $1
            ",
        )
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, guest_email, total_amount, payment_reference,
                   invoice_id, invoice_url, status, created_at
            FROM storefront.orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Every order, newest first. Admin surface only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, guest_email, total_amount, payment_reference,
                   invoice_id, invoice_url, status, created_at
            FROM storefront.orders
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// An order's lines including assigned secrets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, product_id, product_name, quantity,
                   unit_price, assigned_codes, assigned_credentials
            FROM storefront.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }

    /// Flip the order from `pending` to `completed`, once.
    ///
    /// Returns `true` only for the caller that actually performed the flip.
    /// Runs on the fulfillment transaction's connection so the flip and the
    /// pool withdrawals commit or roll back together.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn claim_completion(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = 'completed'
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(order_id.as_i32())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark the order `failed` if it is still `pending`.
    ///
    /// Returns `true` if this call performed the transition. A no-op on
    /// already-terminal orders, so a late failure notice cannot undo a
    /// completed fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn mark_failed_if_pending(
        &self,
        order_id: OrderId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = 'failed'
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(order_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Force a status, bypassing the pending-only guard. Admin surface only;
    /// never triggers fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn override_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = $2
            WHERE id = $1
            ",
        )
        .bind(order_id.as_i32())
        .bind(status.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// The order's lines with product categories, for the fulfillment engine.
    ///
    /// Lines whose product vanished from the catalog fall back to the
    /// non-pooled `other` category (there is no pool left to draw from).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_fulfillment(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Vec<FulfillmentLine>, RepositoryError> {
        let rows: Vec<(i32, i32, String, i32, Option<String>)> = sqlx::query_as(
            r"
            SELECT oi.id, oi.product_id, oi.product_name, oi.quantity,
                   p.category
            FROM storefront.order_item oi
            LEFT JOIN storefront.product p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            ",
        )
        .bind(order_id.as_i32())
        .fetch_all(conn)
        .await?;

        rows.into_iter()
            .map(|(id, product_id, product_name, quantity, category)| {
                let category = category
                    .as_deref()
                    .map(ProductCategory::from_str)
                    .transpose()
                    .map_err(RepositoryError::DataCorruption)?
                    .unwrap_or(ProductCategory::Other);
                Ok(FulfillmentLine {
                    item_id: OrderItemId::new(id),
                    product_id: ProductId::new(product_id),
                    product_name,
                    quantity,
                    category,
                })
            })
            .collect()
    }

    /// Stamp assigned gift codes onto a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn set_line_codes(
        conn: &mut PgConnection,
        item_id: OrderItemId,
        codes: &[String],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.order_item
            SET assigned_codes = $2
            WHERE id = $1
            ",
        )
        .bind(item_id.as_i32())
        .bind(codes)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Stamp assigned account credentials onto a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails, or
    /// `DataCorruption` if the credentials cannot be serialized.
    pub async fn set_line_credentials(
        conn: &mut PgConnection,
        item_id: OrderItemId,
        credentials: &[DeliveredCredential],
    ) -> Result<(), RepositoryError> {
        let json = serde_json::to_value(credentials).map_err(|e| {
            RepositoryError::DataCorruption(format!("cannot serialize credentials: {e}"))
        })?;

        sqlx::query(
            r"
            UPDATE storefront.order_item
            SET assigned_credentials = $2
            WHERE id = $1
            ",
        )
        .bind(item_id.as_i32())
        .bind(json)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Whether the user has a completed order containing the product.
    /// This is the review gate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_completed_purchase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM storefront.orders o
                JOIN storefront.order_item oi ON oi.order_id = o.id
                WHERE o.user_id = $1
                  AND oi.product_id = $2
                  AND o.status = 'completed'
            )
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
