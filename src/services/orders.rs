//! Order builder, payment settlement and the admin status workflow.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::aggregates::{NewOrder, NewOrderItem, Order, OrderError, OrderStatus, OrderTotals, PaymentStatus, ShippingAddress};
use crate::domain::value_objects::{Email, OrderNumber};
use crate::error::{AppError, AppResult};
use crate::payment::{to_minor_units, CheckoutLine, CheckoutRequest, WebhookEvent};
use crate::state::AppState;
use crate::store::{Page, StoreError};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
const SAVE_ATTEMPTS: usize = 3;

/// A validated checkout submission.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: Option<Uuid>,
    pub email: Email,
    pub phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<NewOrderItem>,
    pub totals: OrderTotals,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// Hosted checkout to redirect to; absent in demo mode or once paid.
    pub checkout_url: Option<String>,
    /// False when the submission replayed an earlier idempotency key.
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub expected_version: Option<i32>,
}

/// Key under which a submission is deduplicated. Client keys and derived
/// keys live in separate namespaces.
pub fn idempotency_key(cmd: &PlaceOrder, now_secs: i64, window_secs: u64) -> AppResult<String> {
    if let Some(key) = cmd.idempotency_key.as_deref().map(str::trim) {
        if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(AppError::Validation(format!("Idempotency-Key must be 1 to {MAX_IDEMPOTENCY_KEY_LEN} characters")));
        }
        return Ok(format!("client:{key}"));
    }
    let mut hasher = Sha256::new();
    hasher.update(cmd.email.as_str());
    for item in &cmd.items {
        hasher.update(format!("|{}|{}|{}|{}", item.product_id, item.name, item.price.normalize(), item.quantity));
    }
    let t = cmd.totals;
    hasher.update(format!("|{}|{}|{}|{}", t.subtotal.normalize(), t.shipping.normalize(), t.tax.normalize(), t.total.normalize()));
    let bucket = now_secs.max(0) as u64 / window_secs.max(1);
    hasher.update(format!("|{bucket}"));
    Ok(format!("cart:{}", hex::encode(hasher.finalize())))
}

/// Stores the order, then either opens a payment session or, without a
/// payment bridge, marks it paid. A repeated key resumes the earlier order.
#[instrument(skip(state, cmd), fields(email = %cmd.email, items = cmd.items.len()))]
pub async fn place_order(state: &AppState, cmd: PlaceOrder) -> AppResult<PlacedOrder> {
    if cmd.items.is_empty() { return Err(OrderError::NoItems.into()); }
    let key = idempotency_key(&cmd, Utc::now().timestamp(), state.config.idempotency_window_secs)?;

    let mut order = Order::place(state.order_numbers.next(), NewOrder {
        user_id: cmd.user_id,
        email: cmd.email,
        phone: cmd.phone,
        currency: state.config.currency.clone(),
        totals: cmd.totals,
        shipping_address: cmd.shipping_address,
        items: cmd.items,
        idempotency_key: key,
    })?;
    let events = order.take_events();

    let placement = state.store.insert_order(&order).await.map_err(|e| AppError::internal("Failed to create order", e))?;
    let created = placement.is_new();
    let order = placement.into_order();
    if created {
        tracing::info!(order_id = %order.id(), order_number = %order.order_number(), "order placed");
        state.events.publish(events).await;
    } else {
        tracing::info!(order_id = %order.id(), order_number = %order.order_number(), "duplicate submission, resuming order");
    }
    let (order, checkout_url) = settle(state, order).await?;
    Ok(PlacedOrder { order, checkout_url, created })
}

/// Runs [`settle_once`], reloading the order when a concurrent submission
/// with the same key settled it first. The reloaded order is already paid or
/// carries its checkout URL, so the retry returns the stored result.
async fn settle(state: &AppState, mut order: Order) -> AppResult<(Order, Option<String>)> {
    let id = order.id();
    for _ in 0..SAVE_ATTEMPTS {
        match settle_once(state, order).await {
            Err(AppError::Conflict(_)) => {
                tracing::debug!(order_id = %id, "order settled concurrently, reloading");
                order = state.store.order_by_id(id).await?.ok_or_else(|| AppError::not_found("Order"))?;
            }
            result => return result,
        }
    }
    Err(StoreError::Conflict.into())
}

async fn settle_once(state: &AppState, mut order: Order) -> AppResult<(Order, Option<String>)> {
    if order.payment_status() == PaymentStatus::Paid || order.status() != OrderStatus::Pending {
        return Ok((order, None));
    }
    if let Some(url) = order.checkout_url() {
        let url = url.to_string();
        return Ok((order, Some(url)));
    }

    match &state.payments {
        Some(bridge) => {
            let request = checkout_request(state, &order)?;
            let session = bridge.create_checkout_session(&request).await?;
            order.attach_payment_session(session.session_id, session.redirect_url.clone());
            persist(state, &mut order).await?;
            tracing::info!(order_number = %order.order_number(), "checkout session created");
            Ok((order, Some(session.redirect_url)))
        }
        None => {
            order.confirm_payment(None)?;
            persist(state, &mut order).await?;
            tracing::info!(order_number = %order.order_number(), "demo mode: order marked paid");
            Ok((order, None))
        }
    }
}

fn checkout_request(state: &AppState, order: &Order) -> AppResult<CheckoutRequest> {
    let mut lines = order.items().iter()
        .map(|item| Ok(CheckoutLine {
            name: item.name.clone(),
            image: item.image.clone(),
            unit_amount: to_minor_units(item.price)?,
            quantity: item.quantity,
        }))
        .collect::<Result<Vec<_>, crate::payment::PaymentError>>()?;
    let totals = order.totals();
    for (name, amount) in [("Shipping", totals.shipping), ("Tax", totals.tax)] {
        if !amount.is_zero() {
            lines.push(CheckoutLine { name: name.to_string(), image: None, unit_amount: to_minor_units(amount)?, quantity: 1 });
        }
    }
    let base = &state.config.public_base_url;
    Ok(CheckoutRequest {
        order_id: order.id(),
        order_number: order.order_number().to_string(),
        customer_email: order.email().to_string(),
        currency: order.currency.clone(),
        lines,
        success_url: format!("{base}/checkout/success?order={}", order.order_number()),
        cancel_url: format!("{base}/cart"),
    })
}

/// Writes the order under its version check and publishes what it raised.
async fn persist(state: &AppState, order: &mut Order) -> AppResult<()> {
    order.version = state.store.save_order(order).await?;
    let events = order.take_events();
    state.events.publish(events).await;
    Ok(())
}

/// Applies a confirmed payment. Returns whether the order changed; unknown
/// orders and replays are acknowledged without effect. A payment for an
/// order that already left `pending` is recorded without a status change.
#[instrument(skip(state, event))]
pub async fn reconcile_payment(state: &AppState, event: WebhookEvent) -> AppResult<bool> {
    let WebhookEvent::CheckoutCompleted { session_id, order_id, order_number, payment_intent } = event else {
        return Ok(false);
    };

    for _ in 0..SAVE_ATTEMPTS {
        let order = match (order_id, order_number.as_deref()) {
            (Some(id), _) => state.store.order_by_id(id).await?,
            (None, Some(number)) => match OrderNumber::parse(number) {
                Ok(number) => state.store.order_by_number(&number).await?,
                Err(_) => None,
            },
            (None, None) => None,
        };
        let Some(mut order) = order else {
            tracing::warn!(%session_id, "payment webhook for unknown order");
            return Ok(false);
        };
        if order.payment_intent_id().is_some_and(|known| known != session_id) {
            tracing::warn!(order_number = %order.order_number(), %session_id, "payment webhook session does not match order");
            return Ok(false);
        }

        let reference = order.payment_intent_id().map(String::from).or(Some(session_id.clone()));
        let changed = if order.status() == OrderStatus::Pending {
            order.confirm_payment(reference)?
        } else {
            order.record_late_payment(reference)
        };
        if !changed { return Ok(false); }
        if order.status() == OrderStatus::Cancelled {
            tracing::warn!(order_number = %order.order_number(), %session_id, "payment captured for cancelled order, refund required");
        }
        match persist(state, &mut order).await {
            Ok(()) => {
                tracing::info!(order_number = %order.order_number(), payment_intent = ?payment_intent, "payment confirmed");
                return Ok(true);
            }
            Err(AppError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(AppError::Conflict("order kept changing while applying payment".into()))
}

/// Admin edit: optional status transition plus tracking/notes.
#[instrument(skip(state, update), fields(status = ?update.status))]
pub async fn update_order(state: &AppState, id: Uuid, update: OrderUpdate) -> AppResult<Order> {
    let mut order = state.store.order_by_id(id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    if update.expected_version.is_some_and(|v| v != order.version()) {
        return Err(StoreError::Conflict.into());
    }
    if let Some(next) = update.status {
        order.transition_to(next)?;
    }
    order.annotate(update.tracking_number, update.notes);
    if order.events.is_empty() {
        return Ok(order);
    }
    persist(state, &mut order).await?;
    tracing::info!(order_number = %order.order_number(), status = %order.status(), "order updated");
    Ok(order)
}

/// Guest lookup; a wrong email is indistinguishable from a missing order.
pub async fn guest_lookup(state: &AppState, order_number: &str, email: &str) -> AppResult<Order> {
    let not_found = || AppError::not_found("Order");
    let number = OrderNumber::parse(order_number.trim()).map_err(|_| not_found())?;
    let order = state.store.order_by_number(&number).await?.ok_or_else(not_found)?;
    if !order.email().matches(email) { return Err(not_found()); }
    Ok(order)
}

/// Owner or admin view of a single order.
pub async fn order_for(state: &AppState, identity: &Identity, id: Uuid) -> AppResult<Order> {
    let order = state.store.order_by_id(id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    let user = &identity.user;
    if user.is_admin() || order.belongs_to(user.id, &user.email) {
        Ok(order)
    } else {
        Err(AppError::not_found("Order"))
    }
}

pub async fn customer_orders(state: &AppState, identity: &Identity) -> AppResult<Vec<Order>> {
    Ok(state.store.orders_for_customer(Some(identity.user.id), &identity.user.email).await?)
}

pub async fn list_orders(state: &AppState, status: Option<OrderStatus>, page: Page) -> AppResult<(Vec<Order>, i64)> {
    Ok(state.store.list_orders(status, page).await?)
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<Order> {
    state.store.order_by_id(id).await?.ok_or_else(|| AppError::not_found("Order"))
}
