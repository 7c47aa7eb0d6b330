//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::MoneyError;
use domain_billing::BillingError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    /// HTTP status and machine-readable kind
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_kind();
        let message = match &self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg)
            | ApiError::Validation(msg) => msg.clone(),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(msg) => ApiError::Validation(msg),
            BillingError::IllegalTransition { .. } => ApiError::Conflict(err.to_string()),
            BillingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BillingError::ConcurrencyConflict(_) => ApiError::Conflict(err.to_string()),
            BillingError::Store(ref source) => {
                error!(error = %source, "Ledger store failure");
                ApiError::Internal("Ledger storage is unavailable".to_string())
            }
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(permission) => {
                ApiError::Forbidden(format!("Missing permission: {}", permission))
            }
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::InvalidSubject => {
                ApiError::Unauthorized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    #[test]
    fn test_business_rules_map_to_client_errors() {
        let validation: ApiError = BillingError::validation("Amount must be positive").into();
        assert_eq!(validation.status_and_kind().0, StatusCode::UNPROCESSABLE_ENTITY);

        let transition: ApiError =
            BillingError::illegal_transition("payment", "cancelled", "verify").into();
        assert_eq!(transition.status_and_kind().0, StatusCode::CONFLICT);

        let missing: ApiError = BillingError::not_found("Bill", "BIL-1").into();
        assert_eq!(missing.status_and_kind().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_failure_hides_details() {
        let store = PortError::connection("password authentication failed");
        let err: ApiError = BillingError::Store(store).into();
        assert_eq!(err.status_and_kind().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("password"));
    }

    #[test]
    fn test_auth_errors() {
        let expired: ApiError = AuthError::TokenExpired.into();
        assert_eq!(expired.status_and_kind().0, StatusCode::UNAUTHORIZED);

        let forbidden: ApiError = AuthError::MissingPermission("payment:verify".into()).into();
        assert_eq!(forbidden.status_and_kind().0, StatusCode::FORBIDDEN);
    }
}
