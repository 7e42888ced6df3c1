//! Order browsing handlers. Owner-only: guests can't list orders (their
//! identity is an email, not a session), and a signed-in user sees only
//! their own.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use keyhaven_core::OrderId;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderLine};
use crate::state::AppState;

/// Order detail response: the header plus its lines. Completed orders
/// carry their assigned secrets in the lines.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// `GET /orders` - the signed-in user's order history.
#[tracing::instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}` - one of the user's orders with its lines.
///
/// Responds 404 rather than 403 for someone else's order; the existence of
/// an order id is nobody else's business.
#[tracing::instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>> {
    let id = OrderId::new(id);
    let repo = OrderRepository::new(state.pool());

    let order = repo
        .get(id)
        .await?
        .filter(|o| o.buyer.is_owned_by(user.id))
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let lines = repo.lines(id).await?;

    Ok(Json(OrderDetail { order, lines }))
}
