//! Minimal session auth.
//!
//! Credential verification is an external collaborator's job; this service
//! only needs an identity in the session so carts, orders, and reviews can
//! attach to it. Login is find-or-create by email.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;

use keyhaven_core::Email;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

/// `POST /auth/login` - establish a session identity by email.
#[tracing::instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let email = Email::parse(&request.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let repo = UserRepository::new(state.pool());
    let user = match repo.get_by_email(&email).await? {
        Some(user) => user,
        None => repo.create(&email).await?,
    };

    let current = CurrentUser {
        id: user.id,
        email: user.email,
        is_admin: user.is_admin,
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Json(current))
}

/// `POST /auth/logout` - drop the session identity.
#[tracing::instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(StatusCode::NO_CONTENT)
}
