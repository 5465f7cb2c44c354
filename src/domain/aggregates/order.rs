//! Order Aggregate
//!
//! Owns the status machine and the consistency rules checked when an order
//! is placed. Line items are snapshots of the cart and never change after
//! placement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Email, OrderNumber};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// The legal edges out of this state.
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool { self.allowed_next().contains(&next) }

    pub fn is_terminal(self) -> bool { self.allowed_next().is_empty() }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|status| status.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid" }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(OrderError::UnknownPaymentStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    /// Soft reference: the product may since have been edited or deleted.
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Everything the builder hands over for a new order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub email: Email,
    pub phone: Option<String>,
    pub currency: String,
    pub totals: OrderTotals,
    pub shipping_address: ShippingAddress,
    pub items: Vec<NewOrderItem>,
    pub idempotency_key: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) order_number: OrderNumber,
    pub(crate) user_id: Option<Uuid>,
    pub(crate) email: Email,
    pub(crate) phone: Option<String>,
    pub(crate) subtotal: Decimal,
    pub(crate) shipping: Decimal,
    pub(crate) tax: Decimal,
    pub(crate) total: Decimal,
    pub(crate) currency: String,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) status: OrderStatus,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) payment_intent_id: Option<String>,
    pub(crate) checkout_url: Option<String>,
    pub(crate) tracking_number: Option<String>,
    pub(crate) notes: Option<String>,
    #[serde(skip)]
    pub(crate) idempotency_key: String,
    pub(crate) version: i32,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Order {
    /// Validates the submitted cart and builds a `pending` order.
    pub fn place(order_number: OrderNumber, new: NewOrder) -> Result<Self, OrderError> {
        if new.items.is_empty() { return Err(OrderError::NoItems); }
        for (index, item) in new.items.iter().enumerate() {
            if item.quantity < 1 { return Err(OrderError::InvalidQuantity { index }); }
            if item.price.is_sign_negative() { return Err(OrderError::NegativeAmount("price")); }
            if !is_cents(item.price) { return Err(OrderError::Precision("price")); }
        }
        let totals = new.totals;
        for (field, amount) in [("subtotal", totals.subtotal), ("shipping", totals.shipping), ("tax", totals.tax), ("total", totals.total)] {
            if amount.is_sign_negative() { return Err(OrderError::NegativeAmount(field)); }
            if !is_cents(amount) { return Err(OrderError::Precision(field)); }
        }
        let items_sum: Decimal = new.items.iter().map(|i| i.price * Decimal::from(i.quantity)).sum();
        if items_sum != totals.subtotal {
            return Err(OrderError::SubtotalMismatch { expected: items_sum, actual: totals.subtotal });
        }
        let expected_total = totals.subtotal + totals.shipping + totals.tax;
        if expected_total != totals.total {
            return Err(OrderError::TotalMismatch { expected: expected_total, actual: totals.total });
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let items = new.items.into_iter().map(|i| OrderItem {
            id: Uuid::now_v7(), product_id: i.product_id, name: i.name, price: i.price, quantity: i.quantity, image: i.image,
        }).collect();
        let mut order = Self {
            id, order_number, user_id: new.user_id, email: new.email, phone: new.phone,
            subtotal: totals.subtotal, shipping: totals.shipping, tax: totals.tax, total: totals.total,
            currency: new.currency, shipping_address: new.shipping_address,
            status: OrderStatus::Pending, payment_status: PaymentStatus::Pending,
            payment_intent_id: None, checkout_url: None, tracking_number: None, notes: None,
            idempotency_key: new.idempotency_key, version: 1, items, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id, order_number: order.order_number.to_string(), email: order.email.to_string(), total: order.total,
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &OrderNumber { &self.order_number }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }
    pub fn email(&self) -> &Email { &self.email }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn payment_intent_id(&self) -> Option<&str> { self.payment_intent_id.as_deref() }
    pub fn checkout_url(&self) -> Option<&str> { self.checkout_url.as_deref() }
    pub fn tracking_number(&self) -> Option<&str> { self.tracking_number.as_deref() }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn idempotency_key(&self) -> &str { &self.idempotency_key }
    pub fn version(&self) -> i32 { self.version }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals { subtotal: self.subtotal, shipping: self.shipping, tax: self.tax, total: self.total }
    }

    /// Owner check used by customer lookups: the account id or, for guest
    /// orders placed before sign-up, the email.
    pub fn belongs_to(&self, user_id: Uuid, email: &Email) -> bool {
        self.user_id == Some(user_id) || &self.email == email
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        let from = self.status;
        if !from.can_transition_to(next) { return Err(OrderError::InvalidTransition { from, to: next }); }
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        if next == OrderStatus::Cancelled {
            self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, previous: from }));
        }
        Ok(())
    }

    /// Marks the order paid and starts processing. Returns `false` when the
    /// payment had already been recorded.
    pub fn confirm_payment(&mut self, payment_intent_id: Option<String>) -> Result<bool, OrderError> {
        if self.payment_status == PaymentStatus::Paid { return Ok(false); }
        self.transition_to(OrderStatus::Processing)?;
        self.payment_status = PaymentStatus::Paid;
        if payment_intent_id.is_some() { self.payment_intent_id = payment_intent_id; }
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentConfirmed {
            order_id: self.id, payment_intent_id: self.payment_intent_id.clone(),
        }));
        Ok(true)
    }

    /// Records a payment that cleared after the order left `pending`. The
    /// status is left alone; a cancelled order raises `PaidAfterCancel` so
    /// the refund can be handled. Returns `false` when already paid.
    pub fn record_late_payment(&mut self, payment_intent_id: Option<String>) -> bool {
        if self.payment_status == PaymentStatus::Paid { return false; }
        self.payment_status = PaymentStatus::Paid;
        if payment_intent_id.is_some() { self.payment_intent_id = payment_intent_id; }
        self.touch();
        let payment_intent_id = self.payment_intent_id.clone();
        let event = if self.status == OrderStatus::Cancelled {
            OrderEvent::PaidAfterCancel { order_id: self.id, payment_intent_id }
        } else {
            OrderEvent::PaymentConfirmed { order_id: self.id, payment_intent_id }
        };
        self.raise_event(DomainEvent::Order(event));
        true
    }

    pub fn attach_payment_session(&mut self, session_id: String, checkout_url: String) {
        self.payment_intent_id = Some(session_id);
        self.checkout_url = Some(checkout_url);
        self.touch();
    }

    /// Sets tracking number and notes independently of status. `Some("")`
    /// clears a field, `None` leaves it alone.
    pub fn annotate(&mut self, tracking_number: Option<String>, notes: Option<String>) {
        let mut changed = false;
        if let Some(tracking) = tracking_number {
            self.tracking_number = non_empty(tracking);
            changed = true;
        }
        if let Some(notes) = notes {
            self.notes = non_empty(notes);
            changed = true;
        }
        if changed {
            self.touch();
            self.raise_event(DomainEvent::Order(OrderEvent::Annotated {
                order_id: self.id, tracking_number: self.tracking_number.clone(),
            }));
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn is_cents(amount: Decimal) -> bool { amount.round_dp(2) == amount }

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("No items in cart")]
    NoItems,
    #[error("item {index} must have a quantity of at least 1")]
    InvalidQuantity { index: usize },
    #[error("{0} must not be negative")]
    NegativeAmount(&'static str),
    #[error("{0} must have at most two decimal places")]
    Precision(&'static str),
    #[error("subtotal {actual} does not match the items ({expected})")]
    SubtotalMismatch { expected: Decimal, actual: Decimal },
    #[error("total {actual} does not equal subtotal + shipping + tax ({expected})")]
    TotalMismatch { expected: Decimal, actual: Decimal },
    #[error("invalid order status: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("invalid order status: {0}")]
    UnknownStatus(String),
    #[error("invalid payment status: {0}")]
    UnknownPaymentStatus(String),
}
