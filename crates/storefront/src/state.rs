//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::{OrderMailer, PaymentsClient, PaymentsError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateInitError {
    #[error("payments client: {0}")]
    Payments(#[from] PaymentsError),
    #[error("mailer: {0}")]
    Mailer(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to shared resources like
/// the database pool, the payment provider client, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: PaymentsClient,
    mailer: Option<OrderMailer>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The mailer is built only when the email configuration is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the payments client or the SMTP mailer cannot
    /// be constructed.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateInitError> {
        let payments = PaymentsClient::new(&config.payments)?;
        let mailer = config.email.as_ref().map(OrderMailer::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payment provider client.
    #[must_use]
    pub fn payments(&self) -> &PaymentsClient {
        &self.inner.payments
    }

    /// Get the delivery mailer, if email is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&OrderMailer> {
        self.inner.mailer.as_ref()
    }
}
