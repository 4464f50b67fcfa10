//! Daraja (M-Pesa) client: OAuth token fetch and STK Push initiation.
//!
//! The STK Push prompts the payer's phone directly; completion arrives later
//! on the webhook callback, so the only state kept here is per-call.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MpesaConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushRequest {
    business_short_code: String,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: i64,
    party_a: String,
    party_b: String,
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    call_back_url: String,
    account_reference: String,
    transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
}

#[derive(Clone)]
pub struct MpesaGateway {
    client: reqwest::Client,
    config: MpesaConfig,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let credentials = BASE64.encode(format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        ));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Basic {credentials}"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Send an STK Push for `amount_cents`, referenced by the order number.
    pub async fn stk_push(
        &self,
        phone: &str,
        amount_cents: i64,
        reference: &str,
    ) -> Result<StkPushResponse, GatewayError> {
        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);
        let phone = normalize_phone(phone)?;

        let payload = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: cents_to_shillings(amount_cents),
            party_a: phone.clone(),
            party_b: self.config.shortcode.clone(),
            phone_number: phone,
            call_back_url: self.config.callback_url.clone(),
            account_reference: reference.to_string(),
            transaction_desc: format!("Payment for order {reference}"),
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Daraja only accepts whole shillings; round up so a quoted total is never
/// undercharged.
pub fn cents_to_shillings(amount_cents: i64) -> i64 {
    (amount_cents + 99) / 100
}

/// Accepts `07XXXXXXXX`, `2547XXXXXXXX` or `+2547XXXXXXXX` and yields the
/// `254...` form the gateway expects.
pub fn normalize_phone(phone: &str) -> Result<String, GatewayError> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = if let Some(rest) = digits.strip_prefix("254") {
        format!("254{rest}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else {
        return Err(GatewayError::InvalidPhone(phone.to_string()));
    };
    if normalized.len() != 12 {
        return Err(GatewayError::InvalidPhone(phone.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stk_password_is_base64_of_parts() {
        let password = stk_password("174379", "key", "20260101120000");
        let decoded = BASE64.decode(password).unwrap();
        assert_eq!(decoded, b"174379key20260101120000");
    }

    #[test]
    fn normalizes_local_and_international_phones() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254712345678").unwrap(), "254712345678");
    }

    #[test]
    fn rejects_malformed_phones() {
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("0712345").is_err());
    }

    #[test]
    fn shilling_conversion_rounds_up() {
        assert_eq!(cents_to_shillings(100_000), 1000);
        assert_eq!(cents_to_shillings(100_001), 1001);
    }
}
