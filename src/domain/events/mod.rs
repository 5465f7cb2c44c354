//! Domain events
use crate::domain::aggregates::order::OrderStatus;
use crate::domain::aggregates::user::Role;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    User(UserEvent),
}

impl DomainEvent {
    /// NATS subject suffix, e.g. `orders.cancelled`.
    pub fn subject(&self) -> String {
        match self {
            Self::Order(e) => format!("orders.{}", e.name()),
            Self::User(e) => format!("users.{}", e.name()),
        }
    }
}

/// Emitted by the order aggregate. `Cancelled` is where inventory release,
/// refunds and customer notifications hook in; `PaidAfterCancel` marks money
/// captured for an order that was already cancelled.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, email: String, total: Decimal },
    PaymentConfirmed { order_id: Uuid, payment_intent_id: Option<String> },
    PaidAfterCancel { order_id: Uuid, payment_intent_id: Option<String> },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: Uuid, previous: OrderStatus },
    Annotated { order_id: Uuid, tracking_number: Option<String> },
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::PaidAfterCancel { .. } => "paid_after_cancel",
            Self::StatusChanged { .. } => "status_changed",
            Self::Cancelled { .. } => "cancelled",
            Self::Annotated { .. } => "annotated",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UserEvent {
    RoleChanged { user_id: Uuid, role: Role, changed_by: Uuid },
}

impl UserEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoleChanged { .. } => "role_changed",
        }
    }
}
