use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use super::ValidJson;
use crate::domain::value_objects::Email;
use crate::error::AppResult;
use crate::services::accounts::{self, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

pub async fn sign_up(State(s): State<AppState>, ValidJson(r): ValidJson<SignUpRequest>) -> AppResult<(StatusCode, Json<Session>)> {
    let session = accounts::sign_up(&s, Email::new(r.email)?, &r.password, r.name).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn sign_in(State(s): State<AppState>, ValidJson(r): ValidJson<SignInRequest>) -> AppResult<Json<Session>> {
    let email = Email::new(r.email).map_err(|_| crate::auth::AuthError::InvalidCredentials)?;
    Ok(Json(accounts::sign_in(&s, email, &r.password).await?))
}
