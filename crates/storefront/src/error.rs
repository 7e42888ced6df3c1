//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`. User-facing flows (cart, checkout, reviews)
//! generally surface recoverable errors as redirect-with-message instead;
//! the webhook maps errors to raw status codes for the provider's retry
//! logic.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::notify::NotifyError;
use crate::services::payments::PaymentsError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment provider call failed.
    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    /// Notification delivery failed.
    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested quantity exceeds available inventory.
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(String),

    /// Caller is not allowed to perform the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Uniqueness rule violated (e.g., duplicate review).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Webhook signature did not verify.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) | Self::Notify(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Payments(_) => StatusCode::BAD_GATEWAY,
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Payments(_) | Self::Notify(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) | Self::Notify(_) => {
                "Internal server error".to_string()
            }
            Self::Payments(_) => "Payment provider error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::InsufficientStock("42".to_string());
        assert_eq!(err.to_string(), "Insufficient stock for product 42");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InsufficientStock("x".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Unauthorized("x".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Conflict("x".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::BadRequest("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_hides_internals() {
        let response = AppError::Internal("connection pool exhausted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
