//! Cart route handlers.
//!
//! Every handler resolves the caller's cart identity the same way: the
//! signed-in user if there is one, otherwise the session's guest token.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use keyhaven_core::{CartOwner, ProductId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, session::cart_token};
use crate::models::{CartView, CurrentUser};
use crate::state::AppState;

/// Cart response: lines plus the live total.
#[derive(Debug, Serialize)]
pub struct CartSummary {
    #[serde(flatten)]
    pub view: CartView,
    pub total: Decimal,
}

impl From<CartView> for CartSummary {
    fn from(view: CartView) -> Self {
        let total = view.total();
        Self { view, total }
    }
}

/// Request body for add/update/remove.
#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub product_id: i32,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// The caller's cart identity: user if signed in, session guest token
/// otherwise.
pub(crate) async fn current_owner(
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<CartOwner> {
    if let Some(user) = user {
        return Ok(CartOwner::User { id: user.id });
    }
    let token = cart_token(session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    Ok(CartOwner::Guest { token })
}

/// `GET /cart` - the cart with its live total.
#[tracing::instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartSummary>> {
    let owner = current_owner(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());

    let cart = repo.resolve(owner).await?;
    let view = repo.view(cart.id).await?;

    Ok(Json(CartSummary::from(view)))
}

/// `POST /cart/add` - add a product, merging into an existing line.
///
/// The availability check covers the merged quantity: what is already in
/// the cart plus what is being added must fit the product's current
/// availability.
#[tracing::instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<LineRequest>,
) -> Result<Json<CartSummary>> {
    if request.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let product_id = ProductId::new(request.product_id);
    let listing = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    let owner = current_owner(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());
    let cart = repo.resolve(owner).await?;

    let in_cart = repo.line_quantity(cart.id, product_id).await?;
    let requested = i64::from(in_cart) + i64::from(request.quantity);
    if requested > listing.available {
        return Err(AppError::InsufficientStock(listing.product.name));
    }

    repo.add_item(cart.id, product_id, request.quantity).await?;

    let view = repo.view(cart.id).await?;
    Ok(Json(CartSummary::from(view)))
}

/// `POST /cart/update` - set a line's quantity; zero removes the line.
#[tracing::instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<LineRequest>,
) -> Result<Json<CartSummary>> {
    let product_id = ProductId::new(request.product_id);
    let owner = current_owner(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());
    let cart = repo.resolve(owner).await?;

    let quantity = request.quantity.max(0);
    if quantity > 0 {
        let listing = ProductRepository::new(state.pool())
            .get(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
        if i64::from(quantity) > listing.available {
            return Err(AppError::InsufficientStock(listing.product.name));
        }
    }

    repo.set_quantity(cart.id, product_id, quantity).await?;

    let view = repo.view(cart.id).await?;
    Ok(Json(CartSummary::from(view)))
}

/// `POST /cart/remove` - drop a product's line from the cart.
#[tracing::instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<LineRequest>,
) -> Result<Json<CartSummary>> {
    let owner = current_owner(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());
    let cart = repo.resolve(owner).await?;

    repo.remove_item(cart.id, ProductId::new(request.product_id))
        .await?;

    let view = repo.view(cart.id).await?;
    Ok(Json(CartSummary::from(view)))
}

/// `POST /cart/clear` - empty the cart. The cart row survives.
#[tracing::instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<StatusCode> {
    let owner = current_owner(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());
    let cart = repo.resolve(owner).await?;

    repo.clear(cart.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
