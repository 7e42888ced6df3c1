//! Admin back-office handlers. Every handler sits behind `RequireAdmin`.
//!
//! Pool management works by bulk paste: newline-delimited codes or
//! `username:password` lines replace a product's pool wholesale. Entries
//! that were already consumed keep their `used` flag across the replace
//! (matched by code / username), so re-pasting an amended list never
//! resurrects a delivered secret.

use std::collections::HashSet;
use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use keyhaven_core::{
    AccountCredential, GiftCode, OrderId, OrderStatus, ProductCategory, ProductId,
    parse_account_lines, parse_code_lines,
};

use crate::db::{OrderRepository, ProductRepository, products::ProductInput};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, ProductListing};
use crate::state::AppState;

/// Request body for creating or updating a product.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
    pub category: String,
    #[serde(default)]
    pub stock: i32,
    /// Newline-delimited gift codes; replaces the pool when present.
    pub codes: Option<String>,
    /// Newline-delimited `username:password` lines; replaces the pool when
    /// present.
    pub accounts: Option<String>,
}

impl ProductForm {
    fn input(&self) -> Result<ProductInput> {
        let category = ProductCategory::from_str(&self.category)
            .map_err(|e| AppError::BadRequest(format!("invalid category: {e}")))?;
        if self.price < Decimal::ZERO {
            return Err(AppError::BadRequest("price must not be negative".into()));
        }
        if self.stock < 0 {
            return Err(AppError::BadRequest("stock must not be negative".into()));
        }
        Ok(ProductInput {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
            category,
            stock: self.stock,
        })
    }
}

/// `GET /admin/products` - the full catalog with availability.
#[tracing::instrument(skip(state, _admin))]
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<ProductListing>>> {
    let products = ProductRepository::new(state.pool()).list().await?;
    Ok(Json(products))
}

/// `POST /admin/products` - create a product, optionally seeding its pool.
#[tracing::instrument(skip(state, admin, form))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(form): Json<ProductForm>,
) -> Result<(StatusCode, Json<ProductListing>)> {
    let input = form.input()?;
    let repo = ProductRepository::new(state.pool());

    let id = repo.create(&input).await?;
    apply_pools(&repo, id, &form, true).await?;

    let listing = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::Internal("product missing after create".into()))?;

    tracing::info!(admin = %admin.email, product_id = %id, "Product created");
    Ok((StatusCode::CREATED, Json(listing)))
}

/// `PUT /admin/products/{id}` - update a product; pasted pools replace the
/// existing ones with `used` flags carried over.
#[tracing::instrument(skip(state, admin, form))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
    Json(form): Json<ProductForm>,
) -> Result<Json<ProductListing>> {
    let id = ProductId::new(id);
    let input = form.input()?;
    let repo = ProductRepository::new(state.pool());

    repo.update(id, &input).await?;
    apply_pools(&repo, id, &form, false).await?;

    let listing = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    tracing::info!(admin = %admin.email, product_id = %id, "Product updated");
    Ok(Json(listing))
}

/// `DELETE /admin/products/{id}` - remove a product and its pools.
#[tracing::instrument(skip(state, admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let id = ProductId::new(id);
    let deleted = ProductRepository::new(state.pool()).delete(id).await?;

    if !deleted {
        return Err(AppError::NotFound(format!("product {id}")));
    }

    tracing::info!(admin = %admin.email, product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/products/{id}/codes` - the gift-code pool, used flags
/// included.
#[tracing::instrument(skip(state, _admin))]
pub async fn gift_codes(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Vec<GiftCode>>> {
    let codes = ProductRepository::new(state.pool())
        .gift_codes(ProductId::new(id))
        .await?;
    Ok(Json(codes))
}

/// `GET /admin/products/{id}/accounts` - the credential pool.
#[tracing::instrument(skip(state, _admin))]
pub async fn account_credentials(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Vec<AccountCredential>>> {
    let credentials = ProductRepository::new(state.pool())
        .account_credentials(ProductId::new(id))
        .await?;
    Ok(Json(credentials))
}

/// `GET /admin/orders` - every order, newest first.
#[tracing::instrument(skip(state, _admin))]
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;
    Ok(Json(orders))
}

/// Request body for a manual status override.
#[derive(Debug, Deserialize)]
pub struct StatusOverride {
    pub status: String,
}

/// `POST /admin/orders/{id}/status` - force an order status.
///
/// Bypasses the pending-only guard and never triggers fulfillment; this is
/// the operator's escape hatch, not a second payment path.
#[tracing::instrument(skip(state, admin, request))]
pub async fn override_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
    Json(request): Json<StatusOverride>,
) -> Result<StatusCode> {
    let status = OrderStatus::from_str(&request.status)
        .map_err(|e| AppError::BadRequest(format!("invalid status: {e}")))?;
    let id = OrderId::new(id);

    OrderRepository::new(state.pool())
        .override_status(id, status)
        .await?;

    tracing::warn!(admin = %admin.email, order_id = %id, status = %status, "Order status overridden");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the product's pools from pasted input, if any was supplied.
///
/// On update, entries matching a previously consumed code/username stay
/// consumed. On create there is nothing to carry over.
async fn apply_pools(
    repo: &ProductRepository<'_>,
    id: ProductId,
    form: &ProductForm,
    fresh: bool,
) -> Result<()> {
    if let Some(raw) = &form.codes {
        let mut entries = parse_code_lines(raw);
        if !fresh {
            let used: HashSet<String> = repo
                .gift_codes(id)
                .await?
                .into_iter()
                .filter(|c| c.used)
                .map(|c| c.code)
                .collect();
            mark_used_codes(&mut entries, &used);
        }
        repo.replace_gift_codes(id, &entries).await?;
    }

    if let Some(raw) = &form.accounts {
        let mut entries = parse_account_lines(raw)
            .map_err(|e| AppError::BadRequest(format!("invalid account list: {e}")))?;
        if !fresh {
            let used: HashSet<String> = repo
                .account_credentials(id)
                .await?
                .into_iter()
                .filter(|c| c.used)
                .map(|c| c.username)
                .collect();
            mark_used_credentials(&mut entries, &used);
        }
        repo.replace_account_credentials(id, &entries).await?;
    }

    Ok(())
}

fn mark_used_codes(entries: &mut [GiftCode], used: &HashSet<String>) {
    for entry in entries {
        if used.contains(&entry.code) {
            entry.used = true;
        }
    }
}

fn mark_used_credentials(entries: &mut [AccountCredential], used: &HashSet<String>) {
    for entry in entries {
        if used.contains(&entry.username) {
            entry.used = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_preserves_used_flags() {
        let mut entries = parse_code_lines("AAAA\nBBBB\nCCCC");
        let used: HashSet<String> = ["BBBB".to_string()].into_iter().collect();

        mark_used_codes(&mut entries, &used);

        assert!(!entries[0].used);
        assert!(entries[1].used);
        assert!(!entries[2].used);
    }

    #[test]
    fn test_replace_preserves_used_credentials_by_username() {
        let mut entries = parse_account_lines("alice:pw1\nbob:pw2").expect("valid input");
        let used: HashSet<String> = ["alice".to_string()].into_iter().collect();

        mark_used_credentials(&mut entries, &used);

        assert!(entries[0].used);
        assert!(!entries[1].used);
    }
}
