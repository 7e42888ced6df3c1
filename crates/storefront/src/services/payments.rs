//! Payment provider client: hosted invoice creation and IPN signature
//! verification.
//!
//! The provider never touches card or coin details on our side; checkout
//! creates a hosted invoice and redirects the buyer to it, and the provider
//! calls back with signed IPN (instant payment notification) posts. The
//! only secret material is the API key (outbound) and the IPN shared
//! secret (inbound).

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

use crate::config::PaymentsConfig;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the IPN signature.
pub const IPN_SIGNATURE_HEADER: &str = "x-nowpayments-sig";

/// Errors that can occur when interacting with the payment provider.
#[derive(Debug, Error)]
pub enum PaymentsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or build the client.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Invoice creation request, mirroring the provider's invoice endpoint.
#[derive(Debug, Serialize)]
pub struct InvoiceRequest {
    /// Order total in the price currency.
    pub price_amount: rust_decimal::Decimal,
    /// Fiat price currency code (lowercase).
    pub price_currency: String,
    /// Our payment reference; the provider echoes it back in every IPN.
    pub order_id: String,
    pub order_description: String,
    /// Where the provider posts IPN updates.
    pub ipn_callback_url: String,
    /// Where the buyer lands after paying.
    pub success_url: String,
    /// Where the buyer lands after abandoning the invoice.
    pub cancel_url: String,
}

/// A created hosted invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Provider-issued invoice identifier.
    pub id: String,
    /// Hosted payment page URL.
    pub invoice_url: String,
}

/// The fields of an IPN post the webhook acts on. The provider sends more;
/// everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpnPayload {
    /// Echo of the `order_id` we sent at invoice creation.
    pub order_id: String,
    /// Provider payment status string (`finished`, `failed`, ...).
    pub payment_status: String,
}

/// Payment provider API client.
#[derive(Clone)]
pub struct PaymentsClient {
    client: reqwest::Client,
    api_url: String,
    ipn_secret: SecretString,
}

impl PaymentsClient {
    /// Create a new payment provider client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentsError> {
        let mut headers = HeaderMap::new();

        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| PaymentsError::Parse(format!("Invalid API key format: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("x-api-key", api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            ipn_secret: config.ipn_secret.clone(),
        })
    }

    /// Create a hosted invoice for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the response cannot be
    /// parsed.
    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentsError> {
        let url = format!("{}/v1/invoice", self.api_url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // The provider returns ids as JSON numbers; take the raw value and
        // stringify so a format change doesn't break us.
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentsError::Parse(e.to_string()))?;

        let id = raw
            .get("id")
            .map(stringify_id)
            .ok_or_else(|| PaymentsError::Parse("invoice response missing id".to_string()))?;
        let invoice_url = raw
            .get("invoice_url")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                PaymentsError::Parse("invoice response missing invoice_url".to_string())
            })?
            .to_string();

        Ok(Invoice { id, invoice_url })
    }

    /// Verify an IPN signature: HMAC-SHA512 over the raw request body,
    /// hex-encoded in the [`IPN_SIGNATURE_HEADER`] header.
    ///
    /// Comparison is constant-time via the MAC's own verifier.
    #[must_use]
    pub fn verify_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };

        let mut mac = HmacSha512::new_from_slice(self.ipn_secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body);
        mac.verify_slice(&signature).is_ok()
    }

    /// Produce the signature the provider would send for `body`. Test-side
    /// counterpart of [`Self::verify_signature`].
    #[must_use]
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(self.ipn_secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}

fn stringify_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PaymentsClient {
        PaymentsClient::new(&PaymentsConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: SecretString::from("test-api-key"),
            ipn_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&"),
        })
        .expect("client builds")
    }

    #[test]
    fn test_signature_roundtrip() {
        let client = client();
        let body = br#"{"order_id":"ORDER-abc","payment_status":"finished"}"#;

        let sig = client.sign(body);
        assert!(client.verify_signature(body, &sig));
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let client = client();
        let sig = client.sign(br#"{"order_id":"ORDER-abc","payment_status":"finished"}"#);

        assert!(
            !client.verify_signature(br#"{"order_id":"ORDER-abc","payment_status":"failed"}"#, &sig)
        );
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let body = br#"{"order_id":"ORDER-abc","payment_status":"finished"}"#;
        let sig = client().sign(body);

        let other = PaymentsClient::new(&PaymentsConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: SecretString::from("test-api-key"),
            ipn_secret: SecretString::from("zZ8*wV1%tR6^qP3!oN0&"),
        })
        .expect("client builds");

        assert!(!other.verify_signature(body, &sig));
    }

    #[test]
    fn test_signature_rejects_invalid_hex() {
        let client = client();
        assert!(!client.verify_signature(b"{}", "not hex at all"));
        assert!(!client.verify_signature(b"{}", ""));
    }

    #[test]
    fn test_stringify_id_handles_numbers_and_strings() {
        assert_eq!(stringify_id(&serde_json::json!(4_522_625_843_u64)), "4522625843");
        assert_eq!(stringify_id(&serde_json::json!("inv-1")), "inv-1");
    }
}
