use async_trait::async_trait;
use common::{EventId, MerchItemId, OrderId, ReservationId};
use domain::{
    Event, EventStatus, EventUpdate, MerchItem, MerchItemUpdate, Order, Reservation,
};

use crate::Result;

/// A unit of work against the store.
///
/// Rows are locked by the `lock_*` methods and stay locked until the
/// transaction commits or is dropped. Dropping a transaction without calling
/// [`StoreTx::commit`] discards every write made through it.
#[async_trait]
pub trait StoreTx: Send {
    /// Locks an event row for update and returns its current state.
    ///
    /// Concurrent transactions locking the same event queue behind this one.
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>>;

    /// Writes the seat ledger of an event locked by this transaction.
    async fn record_booking(
        &mut self,
        id: EventId,
        seats_taken: u32,
        status: EventStatus,
    ) -> Result<()>;

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()>;

    /// Serializes all transactions working on the same external payment
    /// reference, whether or not an order exists for it yet.
    async fn lock_payment_reference(&mut self, reference: &str) -> Result<()>;

    /// Looks up an order by payment reference, including orders staged by
    /// this transaction.
    async fn find_order_by_reference(&mut self, reference: &str) -> Result<Option<Order>>;

    /// Locks a merchandise row for update and returns its current state.
    ///
    /// Callers locking several items must do so in ascending id order.
    async fn lock_merch_item(&mut self, id: MerchItemId) -> Result<Option<MerchItem>>;

    /// Writes the stock of an item locked by this transaction.
    async fn set_stock(&mut self, id: MerchItemId, stock: u32) -> Result<()>;

    /// Stages an order and its lines.
    ///
    /// Fails with `DuplicateReference` (at the latest on commit) if an order
    /// for the same payment reference already exists.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Makes every write of this transaction visible at once and releases
    /// its locks.
    async fn commit(self) -> Result<()>;
}

/// Persistent storage for events, reservations, merchandise and orders.
///
/// The seat and stock ledgers are only ever mutated inside a [`StoreTx`].
/// The non-transactional methods below are single-row reads and admin edits.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx + 'static;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    async fn get_event(&self, id: EventId) -> Result<Option<Event>>;

    async fn create_event(&self, event: &Event) -> Result<()>;

    /// Applies an admin edit under the event's row lock.
    ///
    /// `seats_taken` is never written here; the edit is rejected if the new
    /// `total_seats` would drop below it.
    async fn update_event(&self, id: EventId, update: EventUpdate) -> Result<Event>;

    async fn get_merch_item(&self, id: MerchItemId) -> Result<Option<MerchItem>>;

    async fn create_merch_item(&self, item: &MerchItem) -> Result<()>;

    /// Applies an admin edit under the item's row lock.
    async fn update_merch_item(&self, id: MerchItemId, update: MerchItemUpdate)
    -> Result<MerchItem>;

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Reservations for an event, oldest first.
    async fn list_reservations(&self, event_id: EventId) -> Result<Vec<Reservation>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>>;
}
