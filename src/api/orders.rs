use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::ValidJson;
use crate::auth::Identity;
use crate::domain::aggregates::{NewOrderItem, Order, OrderTotals, ShippingAddress};
use crate::domain::value_objects::Email;
use crate::error::{AppError, AppResult};
use crate::services::orders::{self, PlaceOrder};
use crate::state::AppState;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[validate(length(min = 1, message = "is required"))]
    pub id: String,
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    pub price: Decimal,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub address: String,
    pub apartment: Option<String>,
    #[validate(length(min = 1, message = "is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "is required"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "is required"))]
    pub country: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    #[validate]
    pub items: Vec<CartLine>,
    #[validate]
    pub shipping_address: ShippingForm,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl PlaceOrderRequest {
    fn into_command(self, user_id: Option<Uuid>, idempotency_key: Option<String>) -> AppResult<PlaceOrder> {
        let form = self.shipping_address;
        Ok(PlaceOrder {
            user_id,
            email: Email::new(form.email)?,
            phone: optional(form.phone),
            shipping_address: ShippingAddress {
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                address: form.address.trim().to_string(),
                apartment: optional(form.apartment),
                city: form.city.trim().to_string(),
                state: form.state.trim().to_string(),
                zip_code: form.zip_code.trim().to_string(),
                country: form.country.trim().to_string(),
            },
            items: self.items.into_iter().map(|line| NewOrderItem {
                product_id: line.id,
                name: line.name,
                price: line.price,
                quantity: line.quantity,
                image: optional(line.image),
            }).collect(),
            totals: OrderTotals { subtotal: self.subtotal, shipping: self.shipping, tax: self.tax, total: self.total },
            idempotency_key,
        })
    }
}

pub async fn place_order(
    State(state): State<AppState>,
    identity: Option<Identity>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<PlaceOrderResponse>)> {
    let key = match headers.get(IDEMPOTENCY_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| AppError::Validation("Idempotency-Key must be visible ASCII".into()))?.to_string()),
        None => None,
    };
    let cmd = req.into_command(identity.map(|i| i.user.id), key)?;
    let placed = orders::place_order(&state, cmd).await?;
    let status = if placed.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(PlaceOrderResponse {
        success: true,
        order_number: placed.order.order_number().to_string(),
        checkout_url: placed.checkout_url,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParams {
    pub order_number: Option<String>,
    pub email: Option<String>,
}

pub async fn guest_lookup(State(state): State<AppState>, Query(p): Query<LookupParams>) -> AppResult<Json<Order>> {
    let number = optional(p.order_number).ok_or_else(|| AppError::Validation("Order number required".into()))?;
    let email = optional(p.email).ok_or_else(|| AppError::Validation("Email required".into()))?;
    Ok(Json(orders::guest_lookup(&state, &number, &email).await?))
}

pub async fn get_order(State(state): State<AppState>, identity: Identity, Path(id): Path<Uuid>) -> AppResult<Json<Order>> {
    Ok(Json(orders::order_for(&state, &identity, id).await?))
}

pub async fn my_orders(State(state): State<AppState>, identity: Identity) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(orders::customer_orders(&state, &identity).await?))
}
