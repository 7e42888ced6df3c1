//! Product repository: catalog CRUD, availability, and the atomic pool
//! claims the fulfillment engine relies on.
//!
//! # Availability
//!
//! For pooled categories (giftcard/account) availability is the count of
//! unused pool entries; the `stock` column is only authoritative for
//! currency/other. Every read that feeds a quantity check goes through the
//! pool-aware `available` expression rather than trusting `stock`.
//!
//! # Pool claims
//!
//! `claim_codes`/`claim_credentials` implement "mark the first N unused
//! entries used, all-or-none" as a single conditional UPDATE
//! (`FOR UPDATE SKIP LOCKED` plus a count guard), so two orders racing for
//! the last entry resolve to exactly one winner with no in-process locking.
//! The in-memory reference for this policy is
//! `keyhaven_core::claim_first_unused`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use keyhaven_core::{AccountCredential, GiftCode, ProductCategory, ProductId};

use super::RepositoryError;
use crate::models::{DeliveredCredential, Product, ProductListing};

/// The pool-aware availability expression, shared by list and get queries.
const AVAILABLE_EXPR: &str = r"
    CASE p.category
        WHEN 'giftcard' THEN
            (SELECT count(*) FROM storefront.gift_code g
             WHERE g.product_id = p.id AND NOT g.used)
        WHEN 'account' THEN
            (SELECT count(*) FROM storefront.account_credential a
             WHERE a.product_id = p.id AND NOT a.used)
        ELSE GREATEST(p.stock, 0)::bigint
    END
";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    image_url: String,
    category: String,
    stock: i32,
    created_at: DateTime<Utc>,
    available: i64,
}

impl TryFrom<ProductRow> for ProductListing {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let category = ProductCategory::from_str(&row.category)
            .map_err(RepositoryError::DataCorruption)?;
        Ok(Self {
            product: Product {
                id: ProductId::new(row.id),
                name: row.name,
                description: row.description,
                price: row.price,
                image_url: row.image_url,
                category,
                stock: row.stock,
                created_at: row.created_at,
            },
            available: row.available,
        })
    }
}

/// Fields for creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
    pub category: ProductCategory,
    pub stock: i32,
}

/// Repository for product and pool database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all products with computed availability, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ProductListing>, RepositoryError> {
        let sql = format!(
            r"
            SELECT p.id, p.name, p.description, p.price, p.image_url,
                   p.category, p.stock, p.created_at,
                   {AVAILABLE_EXPR} AS available
            FROM storefront.product p
            ORDER BY p.created_at DESC, p.id DESC
            "
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(ProductListing::try_from).collect()
    }

    /// Get one product with computed availability.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductListing>, RepositoryError> {
        let sql = format!(
            r"
            SELECT p.id, p.name, p.description, p.price, p.image_url,
                   p.category, p.stock, p.created_at,
                   {AVAILABLE_EXPR} AS available
            FROM storefront.product p
            WHERE p.id = $1
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        row.map(ProductListing::try_from).transpose()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO storefront.product
                (name, description, price, image_url, category, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(input.category.as_str())
        .bind(input.stock)
        .fetch_one(self.pool)
        .await?;

        Ok(ProductId::new(id))
    }

    /// Update a product's base fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.product
            SET name = $1, description = $2, price = $3,
                image_url = $4, category = $5, stock = $6
            WHERE id = $7
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(input.category.as_str())
        .bind(input.stock)
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a product and its pools.
    ///
    /// Returns `true` if the product existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The gift-code pool of a product, in pool (insertion) order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn gift_codes(&self, id: ProductId) -> Result<Vec<GiftCode>, RepositoryError> {
        let rows: Vec<(String, bool)> = sqlx::query_as(
            r"
            SELECT code, used
            FROM storefront.gift_code
            WHERE product_id = $1
            ORDER BY id
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(code, used)| GiftCode { code, used })
            .collect())
    }

    /// The credential pool of a product, in pool (insertion) order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn account_credentials(
        &self,
        id: ProductId,
    ) -> Result<Vec<AccountCredential>, RepositoryError> {
        let rows: Vec<(String, String, bool)> = sqlx::query_as(
            r"
            SELECT username, secret, used
            FROM storefront.account_credential
            WHERE product_id = $1
            ORDER BY id
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(username, secret, used)| AccountCredential {
                username,
                secret,
                used,
            })
            .collect())
    }

    /// Replace a product's gift-code pool with `entries`.
    ///
    /// The caller (the admin surface) decides the `used` flag of each entry,
    /// typically re-marking codes that were consumed before the paste.
    /// Insertion order becomes the new allocation order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn replace_gift_codes(
        &self,
        id: ProductId,
        entries: &[GiftCode],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM storefront.gift_code WHERE product_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO storefront.gift_code (product_id, code, used)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(id.as_i32())
            .bind(&entry.code)
            .bind(entry.used)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Replace a product's credential pool with `entries`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn replace_account_credentials(
        &self,
        id: ProductId,
        entries: &[AccountCredential],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM storefront.account_credential WHERE product_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO storefront.account_credential (product_id, username, secret, used)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(id.as_i32())
            .bind(&entry.username)
            .bind(&entry.secret)
            .bind(entry.used)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Atomically claim `quantity` unused gift codes for a product.
    ///
    /// Marks the first `quantity` unused entries (in pool order) used and
    /// returns their codes, or returns `None` without touching anything if
    /// fewer are available. Safe under concurrent fulfillment: the claim is
    /// a single conditional statement over row-locked entries.
    ///
    /// Runs on the caller's connection so it joins the fulfillment
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn claim_codes(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<Vec<String>>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            WITH picked AS (
                SELECT id, code
                FROM storefront.gift_code
                WHERE product_id = $1 AND NOT used
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ), claimed AS (
                UPDATE storefront.gift_code g
                SET used = TRUE
                FROM picked
                WHERE g.id = picked.id
                  AND (SELECT count(*) FROM picked) >= $2
                RETURNING picked.id, picked.code
            )
            SELECT code FROM claimed ORDER BY id
            ",
        )
        .bind(product_id.as_i32())
        .bind(i64::from(quantity))
        .fetch_all(conn)
        .await?;

        if rows.len() < quantity as usize {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().map(|(code,)| code).collect()))
    }

    /// Atomically claim `quantity` unused account credentials for a product.
    ///
    /// Same policy and guarantees as [`Self::claim_codes`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn claim_credentials(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<Vec<DeliveredCredential>>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            WITH picked AS (
                SELECT id, username, secret
                FROM storefront.account_credential
                WHERE product_id = $1 AND NOT used
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ), claimed AS (
                UPDATE storefront.account_credential a
                SET used = TRUE
                FROM picked
                WHERE a.id = picked.id
                  AND (SELECT count(*) FROM picked) >= $2
                RETURNING picked.id, picked.username, picked.secret
            )
            SELECT username, secret FROM claimed ORDER BY id
            ",
        )
        .bind(product_id.as_i32())
        .bind(i64::from(quantity))
        .fetch_all(conn)
        .await?;

        if rows.len() < quantity as usize {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .map(|(username, secret)| DeliveredCredential { username, secret })
                .collect(),
        ))
    }

    /// Decrement the stock counter, floored at zero.
    ///
    /// The floor keeps the `stock >= 0` invariant when the counter has
    /// drifted from the pool (the counter is not authoritative for pooled
    /// categories).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn decrement_stock(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.product
            SET stock = GREATEST(stock - $2, 0)
            WHERE id = $1
            ",
        )
        .bind(product_id.as_i32())
        .bind(i64::from(quantity))
        .execute(conn)
        .await?;

        Ok(())
    }
}
