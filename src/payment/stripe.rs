//! Stripe Checkout via the REST API.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::{CheckoutRequest, CheckoutSession, PaymentBridge, PaymentError};

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub struct StripeBridge {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeBridge {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), secret_key: secret_key.into() }
    }

    fn form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.order_id.to_string()),
            ("metadata[orderId]".to_string(), request.order_id.to_string()),
            ("metadata[orderNumber]".to_string(), request.order_number.clone()),
        ];
        let currency = request.currency.to_lowercase();
        for (i, line) in request.lines.iter().enumerate() {
            let key = |field: &str| format!("line_items[{i}]{field}");
            form.push((key("[price_data][currency]"), currency.clone()));
            form.push((key("[price_data][product_data][name]"), line.name.clone()));
            if let Some(image) = &line.image {
                form.push((key("[price_data][product_data][images][0]"), image.clone()));
            }
            form.push((key("[price_data][unit_amount]"), line.unit_amount.to_string()));
            form.push((key("[quantity]"), line.quantity.to_string()));
        }
        form
    }
}

#[async_trait]
impl PaymentBridge for StripeBridge {
    #[tracing::instrument(skip(self, request), fields(order_number = %request.order_number))]
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let resp: serde_json::Value = self.client
            .post(CHECKOUT_SESSIONS_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&Self::form(request))
            .send()
            .await?
            .json()
            .await?;

        match (resp["id"].as_str(), resp["url"].as_str()) {
            (Some(id), Some(url)) => Ok(CheckoutSession { session_id: id.to_string(), redirect_url: url.to_string() }),
            _ => {
                let message = resp["error"]["message"].as_str().unwrap_or("missing session id or url");
                Err(PaymentError::Provider(message.to_string()))
            }
        }
    }
}

/// Checks a `Stripe-Signature` header (`t=<ts>,v1=<hex>`) against the raw
/// body and rejects timestamps outside the tolerance window.
pub fn verify_webhook_signature(payload: &[u8], sig_header: &str, secret: &str, now: i64) -> Result<(), PaymentError> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }
    if timestamp.is_empty() || signatures.is_empty() {
        return Err(PaymentError::Webhook("invalid Stripe-Signature header"));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::Webhook("invalid webhook secret"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let verified = signatures.iter().any(|sig| {
        hex::decode(sig).map(|bytes| mac.clone().verify_slice(&bytes).is_ok()).unwrap_or(false)
    });
    if !verified {
        return Err(PaymentError::Webhook("signature mismatch"));
    }

    let ts: i64 = timestamp.parse().map_err(|_| PaymentError::Webhook("invalid timestamp"))?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(PaymentError::Webhook("timestamp outside tolerance"));
    }
    Ok(())
}

/// The parts of a webhook event the order flow acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted { session_id: String, order_id: Option<Uuid>, order_number: Option<String>, payment_intent: Option<String> },
    Other(String),
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        let event: serde_json::Value = serde_json::from_slice(payload).map_err(|_| PaymentError::Webhook("malformed event body"))?;
        let kind = event["type"].as_str().ok_or(PaymentError::Webhook("event type missing"))?;
        if kind != "checkout.session.completed" {
            return Ok(Self::Other(kind.to_string()));
        }
        let session = &event["data"]["object"];
        let session_id = session["id"].as_str().ok_or(PaymentError::Webhook("session id missing"))?;
        let order_id = session["metadata"]["orderId"].as_str()
            .or_else(|| session["client_reference_id"].as_str())
            .and_then(|id| Uuid::parse_str(id).ok());
        Ok(Self::CheckoutCompleted {
            session_id: session_id.to_string(),
            order_id,
            order_number: session["metadata"]["orderNumber"].as_str().map(String::from),
            payment_intent: session["payment_intent"].as_str().map(String::from),
        })
    }
}

#[cfg(test)]
pub(crate) fn sign_for_test(payload: &[u8], secret: &str, ts: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{ts}.").as_bytes());
    mac.update(payload);
    format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}
