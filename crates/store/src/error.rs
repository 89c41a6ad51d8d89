use domain::ValidationError;
use thiserror::Error;

/// Constraint guarding one order per external payment reference.
pub(crate) const ORDER_REFERENCE_CONSTRAINT: &str = "orders_external_payment_reference_key";

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A row lock could not be acquired in time, or the database aborted the
    /// transaction to break a deadlock or serialization conflict.
    #[error("Contention: {0}")]
    Contention(String),

    /// An order for this external payment reference already exists.
    #[error("Duplicate payment reference: {0}")]
    DuplicateReference(String),

    /// The requested edit is not valid for the current row.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A ledger or schema invariant was violated.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether retrying the whole operation from scratch may succeed.
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::PoolTimedOut = err {
            return StoreError::Contention("timed out acquiring a connection".to_string());
        }

        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                // lock_not_available, deadlock_detected, serialization_failure
                Some("55P03") | Some("40P01") | Some("40001") => {
                    return StoreError::Contention(db_err.message().to_string());
                }
                Some("23505") if db_err.constraint() == Some(ORDER_REFERENCE_CONSTRAINT) => {
                    return StoreError::DuplicateReference(db_err.message().to_string());
                }
                Some("23514") => {
                    return StoreError::Invariant(db_err.message().to_string());
                }
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
