//! Commerce error types.

use domain::{CapacityExceeded, InsufficientStock, ValidationError};
use payments::GatewayError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the commerce services.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed input, rejected before any transaction began.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A table booking would overrun the event's seat ceiling.
    #[error(transparent)]
    CapacityExceeded(#[from] CapacityExceeded),

    /// A cart line asks for more units than the item holds.
    #[error(transparent)]
    InsufficientStock(#[from] InsufficientStock),

    /// Reconciliation was handed facts for a payment that did not succeed.
    #[error("payment {0} has not succeeded")]
    PaymentNotVerified(String),

    /// The processor could not confirm the payment.
    #[error("{0}")]
    VerificationFailed(String),

    /// The processor refused or failed to open a checkout session.
    #[error("payment processor unavailable: {0}")]
    Gateway(GatewayError),

    /// A row lock could not be taken in time. Retrying the whole operation
    /// may succeed.
    #[error("resource busy, please try again: {0}")]
    Contention(String),

    #[error("payment processor not configured: {0}")]
    UnknownProcessor(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl CommerceError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CommerceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            CommerceError::Validation(_) | CommerceError::UnknownProcessor(_) => "invalid",
            CommerceError::NotFound { .. } => "not_found",
            CommerceError::CapacityExceeded(_) => "fully_booked",
            CommerceError::InsufficientStock(_) => "out_of_stock",
            CommerceError::PaymentNotVerified(_) => "not_verified",
            CommerceError::VerificationFailed(_) => "verification_failed",
            CommerceError::Gateway(_) => "gateway_error",
            CommerceError::Contention(_) => "contention",
            CommerceError::Store(_) => "error",
        }
    }
}

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => CommerceError::NotFound { kind, id },
            StoreError::Contention(reason) => CommerceError::Contention(reason),
            StoreError::Validation(e) => CommerceError::Validation(e),
            other => CommerceError::Store(other),
        }
    }
}

impl From<GatewayError> for CommerceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(e) => CommerceError::Validation(e),
            other => CommerceError::Gateway(other),
        }
    }
}

/// Convenience type alias for commerce results.
pub type Result<T> = std::result::Result<T, CommerceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        assert!(matches!(
            CommerceError::from(StoreError::Contention("lock".into())),
            CommerceError::Contention(_)
        ));
        assert!(matches!(
            CommerceError::from(StoreError::not_found("event", "e1")),
            CommerceError::NotFound { kind: "event", .. }
        ));
        assert!(matches!(
            CommerceError::from(StoreError::Invariant("boom".into())),
            CommerceError::Store(_)
        ));
    }

    #[test]
    fn gateway_rejections_are_validation_errors() {
        let rejected = GatewayError::Rejected(ValidationError::new("items", "too many"));
        assert!(matches!(
            CommerceError::from(rejected),
            CommerceError::Validation(ValidationError { field: "items", .. })
        ));
        assert!(matches!(
            CommerceError::from(GatewayError::Timeout),
            CommerceError::Gateway(GatewayError::Timeout)
        ));
    }

    #[test]
    fn capacity_message_is_user_facing() {
        let err = CommerceError::from(CapacityExceeded {
            requested: 6,
            available: 2,
        });
        assert_eq!(
            err.to_string(),
            "not enough seats available: requested 6, available 2"
        );
        assert_eq!(err.outcome(), "fully_booked");
    }
}
