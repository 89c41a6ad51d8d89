//! Commerce services.
//!
//! - [`ReservationService`]: books free tickets and paid tables against an
//!   event's capacity ledger
//! - [`ReconciliationService`]: turns a verified payment into exactly one
//!   order, taking stock for every line
//! - [`CheckoutService`]: opens processor sessions and confirms payments
//! - [`CatalogService`]: admin edits and reads
//!
//! Every ledger mutation happens inside a single store transaction.
//! Notifications are queued only after that transaction commits.

pub mod catalog;
pub mod checkout;
pub mod error;
pub mod reconcile;
pub mod reservation;

pub use catalog::CatalogService;
pub use checkout::{CheckoutItem, CheckoutRequest, CheckoutService};
pub use error::{CommerceError, Result};
pub use reconcile::{ReconcileOutcome, Reconciliation, ReconciliationService};
pub use reservation::{ReservationRequest, ReservationService};
