//! Cart repository.
//!
//! One cart per identity (user or guest token), one line per product.
//! Adding a product that is already in the cart merges quantities via
//! `ON CONFLICT` rather than creating a second line, so a concurrent
//! double-submit still ends with a single merged line.

use sqlx::PgPool;

use keyhaven_core::{CartId, CartItemId, CartOwner, ProductId};

use super::RepositoryError;
use crate::models::{Cart, CartLine, CartView};

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    product_id: i32,
    product_name: String,
    unit_price: rust_decimal::Decimal,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the cart for an identity, creating it on first touch.
    ///
    /// Insert-or-ignore then re-select, so two concurrent first touches
    /// both land on the same row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails, or
    /// `DataCorruption` if the create-then-select roundtrip finds nothing.
    pub async fn resolve(&self, owner: CartOwner) -> Result<Cart, RepositoryError> {
        let existing = self.find(owner).await?;
        if let Some(cart) = existing {
            return Ok(cart);
        }

        match owner {
            CartOwner::User { id } => {
                sqlx::query(
                    r"
                    INSERT INTO storefront.cart (user_id)
                    VALUES ($1)
                    ON CONFLICT DO NOTHING
                    ",
                )
                .bind(id.as_i32())
                .execute(self.pool)
                .await?;
            }
            CartOwner::Guest { token } => {
                sqlx::query(
                    r"
                    INSERT INTO storefront.cart (guest_token)
                    VALUES ($1)
                    ON CONFLICT DO NOTHING
                    ",
                )
                .bind(token)
                .execute(self.pool)
                .await?;
            }
        }

        self.find(owner).await?.ok_or_else(|| {
            RepositoryError::DataCorruption("cart missing immediately after insert".to_owned())
        })
    }

    async fn find(&self, owner: CartOwner) -> Result<Option<Cart>, RepositoryError> {
        let row: Option<(i32,)> = match owner {
            CartOwner::User { id } => {
                sqlx::query_as("SELECT id FROM storefront.cart WHERE user_id = $1")
                    .bind(id.as_i32())
                    .fetch_optional(self.pool)
                    .await?
            }
            CartOwner::Guest { token } => {
                sqlx::query_as("SELECT id FROM storefront.cart WHERE guest_token = $1")
                    .bind(token)
                    .fetch_optional(self.pool)
                    .await?
            }
        };

        Ok(row.map(|(id,)| Cart {
            id: CartId::new(id),
            owner,
        }))
    }

    /// The cart's lines joined against the live catalog, at current prices.
    ///
    /// Lines whose product was deleted from the catalog drop out of the
    /// join (and out of any total computed from the view).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn view(&self, cart_id: CartId) -> Result<CartView, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity
            FROM storefront.cart_item ci
            JOIN storefront.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id
            ",
        )
        .bind(cart_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(CartView {
            cart_id,
            lines: rows.into_iter().map(CartLine::from).collect(),
        })
    }

    /// Quantity of a product already in the cart, zero if absent.
    ///
    /// Used for availability checks before an add merges quantities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r"
            SELECT quantity FROM storefront.cart_item
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or(0, |(q,)| q))
    }

    /// Add a product to the cart, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = cart_item.quantity + EXCLUDED.quantity
            ",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Set a line's quantity outright. A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return self.remove_item(cart_id, product_id).await;
        }

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_item
            SET quantity = $3
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a product's line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart. The cart row itself survives.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
            .bind(cart_id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Empty a signed-in user's cart by user ID, if they have one.
    ///
    /// Used by the payment webhook, which has the order's buyer but no
    /// session. Guest carts cannot be cleared this way (the guest token
    /// lives only in the buyer's session); they are cleared when the buyer
    /// lands on the success page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn clear_for_user(
        &self,
        user_id: keyhaven_core::UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM storefront.cart_item ci
            USING storefront.cart c
            WHERE ci.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
