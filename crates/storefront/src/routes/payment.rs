//! Checkout and payment webhook handlers.
//!
//! Checkout creates a hosted invoice with the provider and records a
//! pending order snapshot; the buyer pays on the provider's page and the
//! provider calls `POST /payment/ipn` with signed status updates. The
//! webhook is the only caller of the fulfillment engine.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use keyhaven_core::{Buyer, CurrencyCode, Email};

use crate::db::{CartRepository, OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::{Order, OrderLine};
use crate::routes::cart::{CartSummary, current_owner};
use crate::services::payments::{IPN_SIGNATURE_HEADER, InvoiceRequest, IpnPayload};
use crate::services::{FulfillmentEngine, IpnOutcome};
use crate::state::AppState;

/// `GET /checkout` - cart summary with the live total, as the buyer will
/// be charged it.
#[tracing::instrument(skip(state, session, user))]
pub async fn checkout(
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

/// Request body for `POST /payment/create`.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Contact email; required for guest checkout, ignored when signed in.
    pub email: Option<String>,
}

/// `POST /payment/create` - create the hosted invoice and the pending
/// order, then redirect the buyer to the provider's payment page.
///
/// The total is re-derived from the live cart here; whatever a client
/// displayed earlier has no bearing on what gets invoiced. Invoice and
/// order creation are two steps, not one transaction: an invoice with no
/// order behind it simply never completes.
#[tracing::instrument(skip(state, session, user, request))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Redirect> {
    let buyer = match &user {
        Some(user) => Buyer::User { id: user.id },
        None => {
            let raw = request
                .email
                .as_deref()
                .ok_or_else(|| AppError::BadRequest("email is required for guest checkout".into()))?;
            let email = Email::parse(raw)
                .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
            Buyer::Guest { email }
        }
    };

    let owner = current_owner(&session, user.as_ref()).await?;
    let carts = CartRepository::new(state.pool());
    let cart = carts.resolve(owner).await?;
    let view = carts.view(cart.id).await?;

    if view.is_empty() {
        return Err(AppError::BadRequest("cart is empty".into()));
    }

    let payment_reference = format!("ORDER-{}", Uuid::new_v4());
    let base_url = &state.config().base_url;

    let invoice = state
        .payments()
        .create_invoice(&InvoiceRequest {
            price_amount: view.total(),
            price_currency: CurrencyCode::USD.as_str().to_ascii_lowercase(),
            order_id: payment_reference.clone(),
            order_description: format!("{} item(s)", view.lines.len()),
            ipn_callback_url: format!("{base_url}/payment/ipn"),
            success_url: format!("{base_url}/payment/success"),
            cancel_url: format!("{base_url}/payment/cancel"),
        })
        .await?;

    let order = OrderRepository::new(state.pool())
        .create(
            &buyer,
            &view,
            &payment_reference,
            &invoice.id,
            &invoice.invoice_url,
        )
        .await?;

    tracing::info!(
        order_id = %order.id,
        payment_reference = %payment_reference,
        "Order created, redirecting to invoice"
    );

    Ok(Redirect::to(&invoice.invoice_url))
}

/// `GET /payment/success` - post-payment landing.
///
/// Clears the guest cart here: the webhook cannot reach it (the guest
/// token lives in this session, not on the order). Signed-in carts were
/// already cleared by fulfillment.
#[tracing::instrument(skip(state, session, user))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<serde_json::Value>> {
    if user.is_none() {
        let owner = current_owner(&session, None).await?;
        let repo = CartRepository::new(state.pool());
        let cart = repo.resolve(owner).await?;
        repo.clear(cart.id).await?;
    }

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "Payment received. Your order will be delivered shortly."
    })))
}

/// `GET /payment/cancel` - abandoned-invoice landing; back to the cart.
pub async fn cancel() -> Redirect {
    Redirect::to("/cart")
}

/// `POST /payment/ipn` - the provider's signed payment notification.
///
/// Raw-body handler: the signature covers the bytes as sent, so the body
/// must not round-trip through a typed extractor first. Responses are
/// plain status codes for the provider's retry loop - 401 bad signature,
/// 404 unknown order, 200 for anything handled (including benign no-ops).
#[tracing::instrument(skip(state, headers, body))]
pub async fn ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(IPN_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    if !state.payments().verify_signature(&body, signature) {
        return Err(AppError::InvalidSignature);
    }

    let payload: IpnPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed IPN payload: {e}")))?;

    let outcome = FulfillmentEngine::new(state.pool())
        .process_ipn(&payload)
        .await?;

    match outcome {
        IpnOutcome::OrderNotFound => {
            tracing::warn!(order_id = %payload.order_id, "IPN for unknown order");
            Err(AppError::NotFound(format!("order {}", payload.order_id)))
        }
        IpnOutcome::Ignored { status } => {
            tracing::info!(order_id = %payload.order_id, status = %status, "IPN ignored");
            Ok(StatusCode::OK)
        }
        IpnOutcome::AlreadyProcessed { order } => {
            tracing::info!(order_id = %order.id, "Duplicate IPN, order already terminal");
            Ok(StatusCode::OK)
        }
        IpnOutcome::Failed { order } => {
            tracing::info!(order_id = %order.id, "Order marked failed");
            Ok(StatusCode::OK)
        }
        IpnOutcome::Completed {
            order,
            lines,
            shortfalls,
        } => {
            if !shortfalls.is_empty() {
                tracing::warn!(
                    order_id = %order.id,
                    skipped = ?shortfalls,
                    "Order completed with unfulfilled lines"
                );
            }
            deliver(&state, &order, &lines).await;
            Ok(StatusCode::OK)
        }
    }
}

/// Send the delivery email, best-effort. The secrets are on the order page
/// regardless, so a failed send is logged and otherwise swallowed.
async fn deliver(state: &AppState, order: &Order, lines: &[OrderLine]) {
    let Some(mailer) = state.mailer() else {
        return;
    };

    let recipient = match resolve_buyer_email(state, order).await {
        Ok(Some(email)) => email,
        Ok(None) => {
            tracing::warn!(order_id = %order.id, "No email on record for buyer; skipping delivery mail");
            return;
        }
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to resolve buyer email");
            return;
        }
    };

    if let Err(e) = mailer.send_delivery(&recipient, order, lines).await {
        tracing::warn!(order_id = %order.id, error = %e, "Delivery email failed");
    }
}

async fn resolve_buyer_email(state: &AppState, order: &Order) -> Result<Option<String>> {
    match &order.buyer {
        Buyer::Guest { email } => Ok(Some(email.as_str().to_owned())),
        Buyer::User { id } => {
            let user = UserRepository::new(state.pool()).get_by_id(*id).await?;
            Ok(user.map(|u| u.email.into_inner()))
        }
    }
}
