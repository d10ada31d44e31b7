//! Minimal Stripe Checkout client over the form-encoded REST API.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use log::{info, warn};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    config::StripeConfig,
    error::{AppError, AppResult},
};

/// Signed webhook timestamps older than this are rejected.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    currency: String,
    api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub payment_status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn booking_id(&self) -> Option<&str> {
        self.metadata.get("booking_id").map(String::as_str)
    }

    /// True when the session charged at least `amount` major units.
    pub fn covers(&self, amount: f64) -> bool {
        self.amount_total
            .map_or(false, |total| total >= to_minor_units(amount))
    }
}

/// What a checkout session charges for.
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub booking_id: String,
    pub name: String,
    pub description: String,
    pub amount: f64,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Stripe amounts are integers in the currency's minor unit.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn checkout_form(item: &CheckoutItem, currency: &str) -> Vec<(String, String)> {
    vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), item.success_url.clone()),
        ("cancel_url".into(), item.cancel_url.clone()),
        ("customer_email".into(), item.customer_email.clone()),
        ("client_reference_id".into(), item.booking_id.clone()),
        ("metadata[booking_id]".into(), item.booking_id.clone()),
        ("line_items[0][quantity]".into(), "1".into()),
        ("line_items[0][price_data][currency]".into(), currency.to_lowercase()),
        (
            "line_items[0][price_data][unit_amount]".into(),
            to_minor_units(item.amount).to_string(),
        ),
        ("line_items[0][price_data][product_data][name]".into(), item.name.clone()),
        (
            "line_items[0][price_data][product_data][description]".into(),
            item.description.clone(),
        ),
    ]
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_checkout_session(&self, item: &CheckoutItem) -> AppResult<CheckoutSession> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(item, &self.currency))
            .send()
            .await?;
        let session: CheckoutSession = parse_response(response).await?;
        info!("Created checkout session {} for booking {}", session.id, item.booking_id);
        Ok(session)
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::validation("Malformed checkout session id"));
        }
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        parse_response(response).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let message = response
        .json::<StripeErrorBody>()
        .await
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| format!("HTTP {}", status));
    if status.is_client_error() {
        warn!("Stripe rejected request: {}", message);
        return Err(AppError::Payment { message });
    }
    Err(AppError::upstream("Stripe", message))
}

/// Check a `Stripe-Signature` header (`t=...,v1=...`) against the raw payload.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> AppResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| AppError::validation("Signature timestamp missing"))?;
    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(AppError::validation("Signature timestamp outside tolerance"));
    }

    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);

    let mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("webhook secret: {}", e)))?;
    let valid = signatures.iter().any(|sig| {
        let mut mac = mac.clone();
        mac.update(&signed);
        mac.verify_slice(sig).is_ok()
    });

    if valid {
        Ok(())
    } else {
        Err(AppError::validation("Webhook signature mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, t: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", t).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 1_700_000_100).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign(b"{\"amount\":100}", "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(b"{\"amount\":1}", &header, "whsec_test", 1_700_000_000).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_test", 1_700_000_000);
        let late = 1_700_000_000 + WEBHOOK_TOLERANCE_SECS + 1;
        assert!(verify_webhook_signature(payload, &header, "whsec_test", late).is_err());
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        assert!(verify_webhook_signature(b"{}", "v1=abcd", "whsec_test", 0).is_err());
    }

    #[test]
    fn checkout_form_uses_minor_units() {
        let item = CheckoutItem {
            booking_id: "6530c0ffee".into(),
            name: "Udawalawe Elephant Safari".into(),
            description: "2026-11-02 to 2026-11-03".into(),
            amount: 249.99,
            customer_email: "guest@example.com".into(),
            success_url: "http://localhost:5173/payment/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "http://localhost:5173/payment/cancel".into(),
        };
        let form: HashMap<String, String> = checkout_form(&item, "USD").into_iter().collect();
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "24999");
        assert_eq!(form["line_items[0][price_data][currency]"], "usd");
        assert_eq!(form["metadata[booking_id]"], "6530c0ffee");
        assert_eq!(form["mode"], "payment");
    }

    #[test]
    fn session_payment_state() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "metadata": { "booking_id": "abc" }
        }))
        .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.booking_id(), Some("abc"));
        assert!(session.url.is_none());
    }

    #[test]
    fn session_must_cover_the_booking_total() {
        let mut session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "amount_total": 24050,
            "metadata": { "booking_id": "6530c0ffee6530c0ffee6530" }
        }))
        .unwrap();
        assert!(session.covers(240.5));
        assert!(!session.covers(240.51));

        session.amount_total = None;
        assert!(!session.covers(240.5));
    }
}
