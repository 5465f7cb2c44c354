//! Payment bridge: hosted checkout sessions and webhook verification.

mod stripe;

pub use stripe::{verify_webhook_signature, StripeBridge, WebhookEvent};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment provider rejected the request: {0}")]
    Provider(String),
    #[error("amount {0} cannot be expressed in minor units")]
    Amount(Decimal),
    #[error("webhook rejected: {0}")]
    Webhook(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLine {
    pub name: String,
    pub image: Option<String>,
    /// Minor currency units (cents).
    pub unit_amount: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentBridge: Send + Sync + 'static {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;
}

pub fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    let scaled = amount * Decimal::ONE_HUNDRED;
    if scaled.fract() != Decimal::ZERO { return Err(PaymentError::Amount(amount)); }
    scaled.to_i64().ok_or(PaymentError::Amount(amount))
}
