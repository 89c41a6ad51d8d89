//! Domain error types.

use common::MerchItemId;
use thiserror::Error;

/// Malformed input, rejected before any transaction begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A table booking would push an event past its seat ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not enough seats available: requested {requested}, available {available}")]
pub struct CapacityExceeded {
    pub requested: u32,
    pub available: u32,
}

/// A cart line asks for more units than a merchandise item holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("out of stock: {name} (requested {requested}, available {available})")]
pub struct InsufficientStock {
    pub item: MerchItemId,
    pub name: String,
    pub requested: u32,
    pub available: u32,
}
