//! The fulfillment engine: turns a verified payment notification into a
//! one-shot inventory withdrawal.
//!
//! Everything that must not happen twice happens inside a single
//! transaction: the pending-to-completed status flip, the pool claims, and
//! the stamping of secrets onto order lines. The flip is a conditional
//! update, so a replayed or concurrent notification loses the race, sees
//! zero rows affected, and leaves the pools untouched.
//!
//! Shortfalls are best-effort by line: a line whose pool ran dry between
//! checkout and payment is skipped (and reported) rather than failing the
//! order the buyer already paid for.

use sqlx::PgPool;

use keyhaven_core::{OrderStatus, PaymentDisposition, ProductCategory};

use crate::db::{
    CartRepository, OrderRepository, ProductRepository, RepositoryError, orders::FulfillmentLine,
};
use crate::models::{Order, OrderLine};
use crate::services::payments::IpnPayload;

/// What a payment notification amounted to.
#[derive(Debug)]
pub enum IpnOutcome {
    /// No order carries the referenced payment reference.
    OrderNotFound,
    /// A non-terminal provider status; nothing to do yet.
    Ignored { status: String },
    /// The order already left `pending`; this delivery is a replay.
    AlreadyProcessed { order: Order },
    /// Payment failed or expired while the order was still pending.
    Failed { order: Order },
    /// This delivery won the completion flip and fulfilled the order.
    Completed {
        order: Order,
        /// The order's lines with assigned secrets, for delivery.
        lines: Vec<OrderLine>,
        /// Product names of lines skipped because their pool ran dry.
        shortfalls: Vec<String>,
    },
}

/// Fulfillment engine over the storefront database.
pub struct FulfillmentEngine<'a> {
    pool: &'a PgPool,
}

impl<'a> FulfillmentEngine<'a> {
    /// Create a new fulfillment engine.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Process a verified payment notification.
    ///
    /// The caller has already checked the signature; this only decides and
    /// applies the state change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a database operation fails; the
    /// transaction rolls back and the notification can be redelivered.
    pub async fn process_ipn(&self, payload: &IpnPayload) -> Result<IpnOutcome, RepositoryError> {
        let orders = OrderRepository::new(self.pool);

        let Some(order) = orders.get_by_payment_reference(&payload.order_id).await? else {
            return Ok(IpnOutcome::OrderNotFound);
        };

        match PaymentDisposition::from_provider_status(&payload.payment_status) {
            PaymentDisposition::Ignore => Ok(IpnOutcome::Ignored {
                status: payload.payment_status.clone(),
            }),
            PaymentDisposition::Fail => {
                let transitioned = orders.mark_failed_if_pending(order.id).await?;
                if transitioned {
                    let mut order = order;
                    order.status = OrderStatus::Failed;
                    Ok(IpnOutcome::Failed { order })
                } else {
                    Ok(IpnOutcome::AlreadyProcessed { order })
                }
            }
            PaymentDisposition::Complete => self.complete(order).await,
        }
    }

    /// Flip the order to completed and withdraw inventory, atomically.
    async fn complete(&self, mut order: Order) -> Result<IpnOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !OrderRepository::claim_completion(&mut *tx, order.id).await? {
            return Ok(IpnOutcome::AlreadyProcessed { order });
        }

        let lines = OrderRepository::lines_for_fulfillment(&mut *tx, order.id).await?;
        let mut shortfalls = Vec::new();

        for line in &lines {
            if !Self::fulfill_line(&mut *tx, line).await? {
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %line.product_id,
                    product = %line.product_name,
                    quantity = line.quantity,
                    "Inventory pool exhausted; line skipped"
                );
                shortfalls.push(line.product_name.clone());
            }
        }

        tx.commit().await?;

        order.status = OrderStatus::Completed;

        // Best-effort: the buyer's cart served its purpose. Guest carts are
        // keyed by a session-held token the webhook doesn't have; those are
        // cleared when the buyer lands on the success page.
        if let Some(user_id) = order.buyer.user_id()
            && let Err(e) = CartRepository::new(self.pool).clear_for_user(user_id).await
        {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to clear cart after fulfillment");
        }

        let delivered = OrderRepository::new(self.pool).lines(order.id).await?;

        Ok(IpnOutcome::Completed {
            order,
            lines: delivered,
            shortfalls,
        })
    }

    /// Fulfill one line on the open transaction. Returns `false` on a pool
    /// shortfall (the line is left unstamped, nothing else changes).
    async fn fulfill_line(
        conn: &mut sqlx::PgConnection,
        line: &FulfillmentLine,
    ) -> Result<bool, RepositoryError> {
        let quantity = u32::try_from(line.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "order item {} has negative quantity",
                line.item_id
            ))
        })?;

        match line.category {
            ProductCategory::Giftcard => {
                let Some(codes) =
                    ProductRepository::claim_codes(&mut *conn, line.product_id, quantity).await?
                else {
                    return Ok(false);
                };
                OrderRepository::set_line_codes(&mut *conn, line.item_id, &codes).await?;
                ProductRepository::decrement_stock(&mut *conn, line.product_id, quantity).await?;
            }
            ProductCategory::Account => {
                let Some(credentials) =
                    ProductRepository::claim_credentials(&mut *conn, line.product_id, quantity)
                        .await?
                else {
                    return Ok(false);
                };
                OrderRepository::set_line_credentials(&mut *conn, line.item_id, &credentials)
                    .await?;
                ProductRepository::decrement_stock(&mut *conn, line.product_id, quantity).await?;
            }
            // No pool behind these; the counter is the whole story.
            ProductCategory::Currency | ProductCategory::Other => {
                ProductRepository::decrement_stock(&mut *conn, line.product_id, quantity).await?;
            }
        }

        Ok(true)
    }
}
