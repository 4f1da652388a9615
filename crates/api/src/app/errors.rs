//! Consistent JSON error responses.
//!
//! Every failure leaves the API as `{ "error": <code>, "message": <text> }`,
//! plus `details` for field-level validation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use validator::ValidationErrors;

use shor_auth::{AuthError, AuthzError, CatalogError};
use shor_core::DomainError;
use shor_infra::{RegistrationError, SeedError, StoreError};

pub type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { message: String, details: Option<Value> },

    #[error("{0}")]
    Unauthenticated(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Referential(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Referential(_) => (StatusCode::BAD_REQUEST, "referential_error"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        match self {
            ApiError::Validation {
                message,
                details: Some(details),
            } => (
                status,
                axum::Json(json!({
                    "error": code,
                    "message": message,
                    "details": details,
                })),
            )
                .into_response(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                json_error(status, code, "internal server error")
            }
            other => json_error(status, code, other.to_string()),
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(m) => ApiError::Conflict(m),
            StoreError::Referential(m) => ApiError::Referential(m),
            StoreError::NotFound(m) => ApiError::NotFound(format!("{m} not found")),
            StoreError::Validation(m) => ApiError::validation(m),
            StoreError::Storage(m) => ApiError::Internal(m),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(m) | DomainError::InvalidId(m) => ApiError::validation(m),
            DomainError::Conflict(m) => ApiError::Conflict(m),
            DomainError::NotFound(m) => ApiError::NotFound(format!("{m} not found")),
            DomainError::InvariantViolation(m) => ApiError::Internal(m),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::AccountInactive => ApiError::Forbidden(err.to_string()),
            AuthError::InvalidToken => ApiError::BadRequest(err.to_string()),
            AuthError::UnknownAccount => ApiError::NotFound(err.to_string()),
            AuthError::Hashing(m) | AuthError::Storage(m) => ApiError::Internal(m),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<SeedError> for ApiError {
    fn from(err: SeedError) -> Self {
        match err {
            SeedError::Catalog(e) => e.into(),
            SeedError::Store(e) => e.into(),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::Validation {
            message: "request validation failed".into(),
            details: serde_json::to_value(&err).ok(),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Invalid(e) => e.into(),
            RegistrationError::Domain(e) => e.into(),
            RegistrationError::Store(e) => e.into(),
            RegistrationError::Auth(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_documented_statuses() {
        let cases = [
            (StoreError::conflict("email taken"), StatusCode::CONFLICT),
            (StoreError::referential("no role"), StatusCode::BAD_REQUEST),
            (StoreError::not_found("class"), StatusCode::NOT_FOUND),
            (StoreError::Validation("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (StoreError::Storage("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn auth_errors_map_to_documented_statuses() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthzError::Forbidden("read_audit_log".into()))
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }
}
