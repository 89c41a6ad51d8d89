//! Shared types for the commerce backend.

pub mod ids;
pub mod money;

pub use ids::{EventId, MerchItemId, OrderId, ReservationId};
pub use money::Money;
