//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commerce::CommerceError;
use domain::ValidationError;

/// API-level error type that maps to HTTP responses.
///
/// Every error body is `{"error": message, "code": code}`. Clients switch on
/// `code`, e.g. `fully_booked` versus `try_again`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),
    /// Malformed request: bad JSON, path segment or query.
    #[error("{0}")]
    BadRequest(String),
    #[error("admin role required")]
    Forbidden,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Commerce(err) => match err {
                CommerceError::Validation(_) | CommerceError::UnknownProcessor(_) => {
                    (StatusCode::BAD_REQUEST, "validation_error")
                }
                CommerceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                CommerceError::CapacityExceeded(_) => (StatusCode::CONFLICT, "fully_booked"),
                CommerceError::InsufficientStock(_) => (StatusCode::CONFLICT, "out_of_stock"),
                CommerceError::PaymentNotVerified(_) => {
                    (StatusCode::PAYMENT_REQUIRED, "payment_not_verified")
                }
                CommerceError::VerificationFailed(_) => {
                    (StatusCode::PAYMENT_REQUIRED, "verification_failed")
                }
                CommerceError::Gateway(_) => (StatusCode::BAD_GATEWAY, "payment_unavailable"),
                CommerceError::Contention(_) => (StatusCode::SERVICE_UNAVAILABLE, "try_again"),
                CommerceError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal server error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Commerce(CommerceError::Validation(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
