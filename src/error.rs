//! HTTP-facing error type.
//!
//! Every layer error converts into [`AppError`]; infrastructure failures are
//! logged here and reach the client only as a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::domain::aggregates::{OrderError, ProductError, UserError};
use crate::domain::value_objects::ValueError;
use crate::payment::PaymentError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentProvider(String),
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{what} not found")) }

    pub fn internal(context: &str, error: impl std::fmt::Display) -> Self {
        tracing::error!(error = %error, "{context}");
        Self::Internal(context.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::not_found("record"),
            StoreError::Duplicate(field) => Self::Validation(format!("{field} is already in use")),
            StoreError::UnknownReference(entity) => Self::Validation(format!("referenced {entity} does not exist")),
            StoreError::Conflict => Self::Conflict("record was modified by another request; reload and retry".into()),
            StoreError::CategoryInUse(count) => Self::Validation(format!(
                "category has {count} products; move or remove them before deleting it"
            )),
            e @ (StoreError::Corrupt(_) | StoreError::Database(_)) => Self::internal("storage operation failed", e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self { Self::Validation(e.to_string()) }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self { Self::Validation(e.to_string()) }
}

impl From<ValueError> for AppError {
    fn from(e: ValueError) -> Self { Self::Validation(e.to_string()) }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::InvalidCredentials => Self::Unauthorized(e.to_string()),
            AuthError::Forbidden(_) => Self::Forbidden(e.to_string()),
            AuthError::Hashing(_) | AuthError::Signing(_) => Self::internal("authentication failed", e),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Webhook(reason) => Self::Validation(format!("webhook rejected: {reason}")),
            other => {
                tracing::error!(error = %other, "payment provider error");
                Self::PaymentProvider("payment provider unavailable; please retry".into())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors("", &e, &mut fields);
        fields.sort();
        Self::Validation(fields.join("; "))
    }
}

/// Flattens nested struct and list errors into `path message` lines, e.g.
/// `items[0].quantity must be at least 1`.
fn collect_field_errors(prefix: &str, errors: &validator::ValidationErrors, out: &mut Vec<String>) {
    use validator::ValidationErrorsKind;
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let message = errs.iter().find_map(|err| err.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                out.push(format!("{path} {message}"));
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(&path, nested, out),
            ValidationErrorsKind::List(entries) => {
                for (index, nested) in entries {
                    collect_field_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}
