//! Domain layer for the commerce backend.
//!
//! Entities carry their own ledger rules:
//! - [`Event`] guards `seats_taken <= total_seats` for table bookings
//! - [`MerchItem`] guards `stock >= 0` for order lines
//!
//! Persistence and atomicity live in the `store` crate. This crate only
//! decides whether a change is legal.

pub mod error;
pub mod event;
pub mod merch;
pub mod order;
pub mod reservation;
pub mod validation;

pub use error::{CapacityExceeded, InsufficientStock, ValidationError};
pub use event::{Event, EventStatus, EventUpdate, NewEvent};
pub use merch::{MerchItem, MerchItemUpdate, NewMerchItem};
pub use order::{
    CartLine, Order, OrderLine, OrderStatus, PaymentProcessor, normalize_cart,
};
pub use reservation::{
    Requester, Reservation, ReservationKind, ReservationStatus, SocialMetadata,
};
