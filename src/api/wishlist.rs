use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{success, ValidJson};
use crate::auth::Identity;
use crate::domain::aggregates::WishlistEntry;
use crate::error::AppResult;
use crate::services::wishlist;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: Uuid,
}

pub async fn list(State(s): State<AppState>, identity: Identity) -> AppResult<Json<Vec<WishlistEntry>>> {
    Ok(Json(wishlist::list(&s, &identity).await?))
}

pub async fn add(State(s): State<AppState>, identity: Identity, ValidJson(r): ValidJson<WishlistRequest>) -> AppResult<(StatusCode, Json<WishlistEntry>)> {
    Ok((StatusCode::CREATED, Json(wishlist::add(&s, &identity, r.product_id).await?)))
}

pub async fn remove(State(s): State<AppState>, identity: Identity, ValidJson(r): ValidJson<WishlistRequest>) -> AppResult<Json<serde_json::Value>> {
    wishlist::remove(&s, &identity, r.product_id).await?;
    Ok(success())
}
