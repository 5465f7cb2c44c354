use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::payment::{verify_webhook_signature, WebhookEvent};
use crate::services::orders;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

pub async fn payment(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Json<serde_json::Value>> {
    let secret = s.config.stripe_webhook_secret.as_deref()
        .ok_or_else(|| AppError::NotFound("payment webhooks are not configured".into()))?;
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing Stripe-Signature header".into()))?;
    verify_webhook_signature(&body, signature, secret, chrono::Utc::now().timestamp())?;

    let event = WebhookEvent::parse(&body)?;
    if let WebhookEvent::Other(kind) = &event {
        tracing::debug!(%kind, "ignoring payment webhook");
    }
    let applied = orders::reconcile_payment(&s, event).await?;
    Ok(Json(json!({ "received": true, "applied": applied })))
}
