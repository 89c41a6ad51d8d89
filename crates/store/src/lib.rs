//! Transactional storage for events, reservations, merchandise and orders.
//!
//! [`Store`] is the seam between the commerce services and persistence. Two
//! implementations ship with the crate:
//! - [`InMemoryStore`] for tests and database-less runs
//! - [`PostgresStore`] for production
//!
//! Both give the same guarantees: row locks held until commit, all writes of a
//! [`StoreTx`] visible together or not at all, and one order per payment
//! reference.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{DEFAULT_LOCK_TIMEOUT, InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
pub use store::{Store, StoreTx};
