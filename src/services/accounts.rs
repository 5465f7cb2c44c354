//! Sign-up, sign-in and admin user management.

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, AuthError, Identity};
use crate::domain::aggregates::{Order, Role, User};
use crate::domain::events::{DomainEvent, UserEvent};
use crate::domain::value_objects::Email;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::{Page, StoreError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub orders: Vec<Order>,
}

#[instrument(skip(state, password, name), fields(email = %email))]
pub async fn sign_up(state: &AppState, email: Email, password: &str, name: Option<String>) -> AppResult<Session> {
    let hash = hash_password(password)?;
    let user = User::register(email, name.filter(|n| !n.trim().is_empty()), hash);
    state.store.insert_user(&user).await.map_err(|e| match e {
        StoreError::Duplicate(_) => AppError::Validation("an account with this email already exists".into()),
        other => other.into(),
    })?;
    tracing::info!(user_id = %user.id, "user registered");
    let token = state.tokens.issue(user.id, user.email.as_str())?;
    Ok(Session { token, user })
}

#[instrument(skip(state, password), fields(email = %email))]
pub async fn sign_in(state: &AppState, email: Email, password: &str) -> AppResult<Session> {
    let user = state.store.user_by_email(&email).await?.ok_or(AuthError::InvalidCredentials)?;
    let hash = user.password_hash.as_deref().ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(password, hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }
    let token = state.tokens.issue(user.id, user.email.as_str())?;
    Ok(Session { token, user })
}

pub async fn list_users(state: &AppState, page: Page) -> AppResult<(Vec<User>, i64)> {
    Ok(state.store.list_users(page).await?)
}

pub async fn user_detail(state: &AppState, id: Uuid) -> AppResult<UserDetail> {
    let user = state.store.user_by_id(id).await?.ok_or_else(|| AppError::not_found("User"))?;
    let orders = state.store.orders_for_customer(Some(user.id), &user.email).await?;
    Ok(UserDetail { user, orders })
}

/// Changes another user's role. Touching one's own role is refused before
/// the requested role is even looked at.
#[instrument(skip(state, admin, requested_role), fields(admin_id = %admin.user.id))]
pub async fn update_role(state: &AppState, admin: &Identity, target: Uuid, requested_role: &str) -> AppResult<User> {
    if admin.user.id == target {
        return Err(AppError::Validation("you cannot change your own role".into()));
    }
    let role: Role = requested_role.trim().parse()?;
    let user = state.store.set_user_role(target, role).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("User"),
        other => other.into(),
    })?;
    tracing::info!(user_id = %user.id, role = %role, "role changed");
    state.events.publish(vec![DomainEvent::User(UserEvent::RoleChanged { user_id: user.id, role, changed_by: admin.user.id })]).await;
    Ok(user)
}
