//! Delivery mailer for fulfilled orders.
//!
//! Sends the buyer their purchased codes and credentials over SMTP via
//! lettre. The mailer is optional (no `SMTP_HOST`, no mail); fulfillment
//! itself never depends on delivery succeeding, since the secrets are also
//! readable from the order page.

use keyhaven_core::{CurrencyCode, Price};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{Order, OrderLine};

/// Errors that can occur when sending delivery email.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// SMTP mailer for order delivery emails.
#[derive(Clone)]
pub struct OrderMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl OrderMailer {
    /// Create a new mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the delivery email for a fulfilled order.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_delivery(
        &self,
        to: &str,
        order: &Order,
        lines: &[OrderLine],
    ) -> Result<(), NotifyError> {
        let (subject, body) = delivery_message(order, lines);

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, order_id = %order.id, "Delivery email sent");
        Ok(())
    }
}

/// Build the delivery email for a fulfilled order.
///
/// Plain text: the secrets go straight into the body, one per line, under
/// their product heading. Lines without assigned secrets (currency and
/// similar) are listed as purchased with no secrets section.
#[must_use]
pub fn delivery_message(order: &Order, lines: &[OrderLine]) -> (String, String) {
    let subject = format!("Your order {} is ready", order.id);

    let mut body = String::new();
    body.push_str(&format!(
        "Thanks for your purchase! Order {} is complete.\n",
        order.id
    ));

    for line in lines {
        body.push_str(&format!("\n{} x{}\n", line.product_name, line.quantity));

        for code in &line.assigned_codes {
            body.push_str(&format!("  Code: {code}\n"));
        }
        for cred in &line.assigned_credentials {
            body.push_str(&format!(
                "  Username: {} / Password: {}\n",
                cred.username, cred.secret
            ));
        }
    }

    let total = Price::new(order.total_amount, CurrencyCode::USD);
    body.push_str(&format!("\nTotal: {total}\n"));
    (subject, body)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use keyhaven_core::{Buyer, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

    use super::*;
    use crate::models::DeliveredCredential;

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            buyer: Buyer::User { id: UserId::new(1) },
            total_amount: "24.99".parse::<Decimal>().expect("valid decimal"),
            payment_reference: "ORDER-test".to_string(),
            invoice_id: "inv-1".to_string(),
            invoice_url: "https://pay.example/inv-1".to_string(),
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }

    fn line(codes: Vec<String>, credentials: Vec<DeliveredCredential>) -> OrderLine {
        OrderLine {
            id: OrderItemId::new(1),
            order_id: OrderId::new(42),
            product_id: ProductId::new(7),
            product_name: "Steam Gift Card $25".to_string(),
            quantity: 2,
            unit_price: "12.50".parse().expect("valid decimal"),
            assigned_codes: codes,
            assigned_credentials: credentials,
        }
    }

    #[test]
    fn test_delivery_message_includes_codes() {
        let lines = vec![line(
            vec!["AAAA-BBBB".to_string(), "CCCC-DDDD".to_string()],
            Vec::new(),
        )];
        let (subject, body) = delivery_message(&order(), &lines);

        assert!(subject.contains("42"));
        assert!(body.contains("Steam Gift Card $25 x2"));
        assert!(body.contains("Code: AAAA-BBBB"));
        assert!(body.contains("Code: CCCC-DDDD"));
        assert!(body.contains("Total: $24.99"));
    }

    #[test]
    fn test_delivery_message_includes_credentials() {
        let lines = vec![line(
            Vec::new(),
            vec![DeliveredCredential {
                username: "alice@example.com".to_string(),
                secret: "hunter2".to_string(),
            }],
        )];
        let (_, body) = delivery_message(&order(), &lines);

        assert!(body.contains("Username: alice@example.com / Password: hunter2"));
    }

    #[test]
    fn test_delivery_message_line_without_secrets() {
        let (_, body) = delivery_message(&order(), &[line(Vec::new(), Vec::new())]);

        assert!(body.contains("Steam Gift Card $25 x2"));
        assert!(!body.contains("Code:"));
        assert!(!body.contains("Username:"));
    }
}
