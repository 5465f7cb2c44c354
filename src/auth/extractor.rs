use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use super::{require_role, AuthError};
use crate::domain::aggregates::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

/// The signed-in user, reloaded from the store on every request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
}

/// An [`Identity`] that passed `require_role(_, Role::Admin)`.
#[derive(Debug, Clone)]
pub struct Admin(pub Identity);

fn bearer(parts: &Parts) -> Result<&str, AuthError> {
    let value = parts.headers.get(header::AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")).map(str::trim).ok_or(AuthError::InvalidToken)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        let claims = state.tokens.verify(bearer(parts)?)?;
        let user = state.store.user_by_id(claims.sub).await?.ok_or(AuthError::InvalidToken)?;
        let identity = Identity { user };
        parts.extensions.insert(identity.clone());
        Ok(identity)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        Ok(Admin(require_role(identity, Role::Admin)?))
    }
}
