use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{EventId, MerchItemId, OrderId, ReservationId};
use domain::{
    Event, EventStatus, EventUpdate, MerchItem, MerchItemUpdate, Order, Reservation,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

/// How long a transaction waits for a row lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type Row<T> = Arc<Mutex<T>>;

#[derive(Default)]
struct Tables {
    events: RwLock<HashMap<EventId, Row<Event>>>,
    merch: RwLock<HashMap<MerchItemId, Row<MerchItem>>>,
    reservations: RwLock<HashMap<ReservationId, Reservation>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    references: std::sync::Mutex<HashMap<String, Row<()>>>,
}

impl Tables {
    async fn event_row(&self, id: EventId) -> Option<Row<Event>> {
        self.events.read().await.get(&id).cloned()
    }

    async fn merch_row(&self, id: MerchItemId) -> Option<Row<MerchItem>> {
        self.merch.read().await.get(&id).cloned()
    }

    fn reference_row(&self, reference: &str) -> Row<()> {
        let mut references = self.references.lock().unwrap_or_else(PoisonError::into_inner);
        references.entry(reference.to_string()).or_default().clone()
    }

    /// Drops the lock entry for `reference` once nobody holds or awaits it.
    /// Clones are only handed out under the map lock, so the count is exact.
    fn release_reference(&self, reference: &str) {
        let mut references = self.references.lock().unwrap_or_else(PoisonError::into_inner);
        if references
            .get(reference)
            .is_some_and(|row| Arc::strong_count(row) == 1)
        {
            references.remove(reference);
        }
    }

    async fn order_by_reference(&self, reference: &str) -> Option<Order> {
        self.orders
            .read()
            .await
            .values()
            .find(|o| o.external_payment_reference == reference)
            .cloned()
    }
}

async fn lock_row<T>(row: Row<T>, timeout: Duration, what: &str) -> Result<OwnedMutexGuard<T>> {
    tokio::time::timeout(timeout, row.lock_owned())
        .await
        .map_err(|_| StoreError::Contention(format!("timed out waiting for the {what} lock")))
}

/// In-memory store for tests and database-less runs.
///
/// Every event and merchandise row sits behind its own mutex, so transactions
/// touching different rows never wait on each other. Writes are staged on the
/// transaction and copied into the rows on commit, while the row locks are
/// still held.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
    lock_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose transactions give up on a row lock after `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::default(),
            lock_timeout,
        }
    }

    pub async fn reservation_count(&self) -> usize {
        self.tables.reservations.read().await.len()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.orders.read().await.len()
    }
}

struct Locked<T> {
    guard: OwnedMutexGuard<T>,
    staged: T,
}

impl<T: Clone> Locked<T> {
    fn new(guard: OwnedMutexGuard<T>) -> Self {
        let staged = (*guard).clone();
        Self { guard, staged }
    }

    fn apply(self) {
        let Locked { mut guard, staged } = self;
        *guard = staged;
    }
}

/// Held advisory lock on a payment reference.
struct ReferenceLock {
    tables: Arc<Tables>,
    reference: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ReferenceLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.tables.release_reference(&self.reference);
    }
}

/// Transaction over an [`InMemoryStore`]. Dropping it rolls back.
pub struct InMemoryTx {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    events: HashMap<EventId, Locked<Event>>,
    merch: HashMap<MerchItemId, Locked<MerchItem>>,
    references: HashMap<String, ReferenceLock>,
    reservations: Vec<Reservation>,
    orders: Vec<Order>,
}

impl InMemoryTx {
    fn staged_order(&self, reference: &str) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| o.external_payment_reference == reference)
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>> {
        if let Some(locked) = self.events.get(&id) {
            return Ok(Some(locked.staged.clone()));
        }

        let Some(row) = self.tables.event_row(id).await else {
            return Ok(None);
        };
        let locked = Locked::new(lock_row(row, self.lock_timeout, "event").await?);
        let event = locked.staged.clone();
        self.events.insert(id, locked);
        Ok(Some(event))
    }

    async fn record_booking(
        &mut self,
        id: EventId,
        seats_taken: u32,
        status: EventStatus,
    ) -> Result<()> {
        let locked = self.events.get_mut(&id).ok_or_else(|| {
            StoreError::Invariant(format!("event {id} is not locked by this transaction"))
        })?;

        if seats_taken > locked.staged.total_seats {
            return Err(StoreError::Invariant(format!(
                "seats_taken {seats_taken} exceeds total_seats {} for event {id}",
                locked.staged.total_seats
            )));
        }

        locked.staged.seats_taken = seats_taken;
        locked.staged.status = status;
        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        let event_id = reservation.event_id;
        if !self.events.contains_key(&event_id) && self.tables.event_row(event_id).await.is_none()
        {
            return Err(StoreError::not_found("event", event_id));
        }
        self.reservations.push(reservation.clone());
        Ok(())
    }

    async fn lock_payment_reference(&mut self, reference: &str) -> Result<()> {
        if self.references.contains_key(reference) {
            return Ok(());
        }

        let row = self.tables.reference_row(reference);
        match lock_row(row, self.lock_timeout, "payment reference").await {
            Ok(guard) => {
                let lock = ReferenceLock {
                    tables: Arc::clone(&self.tables),
                    reference: reference.to_string(),
                    guard: Some(guard),
                };
                self.references.insert(reference.to_string(), lock);
                Ok(())
            }
            Err(e) => {
                self.tables.release_reference(reference);
                Err(e)
            }
        }
    }

    async fn find_order_by_reference(&mut self, reference: &str) -> Result<Option<Order>> {
        if let Some(order) = self.staged_order(reference) {
            return Ok(Some(order.clone()));
        }
        Ok(self.tables.order_by_reference(reference).await)
    }

    async fn lock_merch_item(&mut self, id: MerchItemId) -> Result<Option<MerchItem>> {
        if let Some(locked) = self.merch.get(&id) {
            return Ok(Some(locked.staged.clone()));
        }

        let Some(row) = self.tables.merch_row(id).await else {
            return Ok(None);
        };
        let locked = Locked::new(lock_row(row, self.lock_timeout, "merch item").await?);
        let item = locked.staged.clone();
        self.merch.insert(id, locked);
        Ok(Some(item))
    }

    async fn set_stock(&mut self, id: MerchItemId, stock: u32) -> Result<()> {
        let locked = self.merch.get_mut(&id).ok_or_else(|| {
            StoreError::Invariant(format!("merch item {id} is not locked by this transaction"))
        })?;
        locked.staged.stock = stock;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let reference = &order.external_payment_reference;
        if self.staged_order(reference).is_some()
            || self.tables.order_by_reference(reference).await.is_some()
        {
            return Err(StoreError::DuplicateReference(reference.clone()));
        }
        self.orders.push(order.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTx {
            tables,
            events,
            merch,
            references,
            reservations,
            orders,
            ..
        } = self;

        {
            let mut stored = tables.orders.write().await;
            for order in &orders {
                let reference = &order.external_payment_reference;
                if stored
                    .values()
                    .any(|o| &o.external_payment_reference == reference)
                {
                    return Err(StoreError::DuplicateReference(reference.clone()));
                }
            }
            stored.extend(orders.into_iter().map(|o| (o.id, o)));
        }

        tables
            .reservations
            .write()
            .await
            .extend(reservations.into_iter().map(|r| (r.id, r)));

        events.into_values().for_each(Locked::apply);
        merch.into_values().for_each(Locked::apply);
        drop(references);
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        Ok(InMemoryTx {
            tables: Arc::clone(&self.tables),
            lock_timeout: self.lock_timeout,
            events: HashMap::new(),
            merch: HashMap::new(),
            references: HashMap::new(),
            reservations: Vec::new(),
            orders: Vec::new(),
        })
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let Some(row) = self.tables.event_row(id).await else {
            return Ok(None);
        };
        let guard = lock_row(row, self.lock_timeout, "event").await?;
        Ok(Some((*guard).clone()))
    }

    async fn create_event(&self, event: &Event) -> Result<()> {
        let mut events = self.tables.events.write().await;
        if events.contains_key(&event.id) {
            return Err(StoreError::Invariant(format!("event {} already exists", event.id)));
        }
        events.insert(event.id, Arc::new(Mutex::new(event.clone())));
        Ok(())
    }

    async fn update_event(&self, id: EventId, update: EventUpdate) -> Result<Event> {
        let row = self
            .tables
            .event_row(id)
            .await
            .ok_or_else(|| StoreError::not_found("event", id))?;
        let mut guard = lock_row(row, self.lock_timeout, "event").await?;

        let mut event = (*guard).clone();
        event.apply_update(update)?;
        *guard = event.clone();
        Ok(event)
    }

    async fn get_merch_item(&self, id: MerchItemId) -> Result<Option<MerchItem>> {
        let Some(row) = self.tables.merch_row(id).await else {
            return Ok(None);
        };
        let guard = lock_row(row, self.lock_timeout, "merch item").await?;
        Ok(Some((*guard).clone()))
    }

    async fn create_merch_item(&self, item: &MerchItem) -> Result<()> {
        let mut merch = self.tables.merch.write().await;
        if merch.contains_key(&item.id) {
            return Err(StoreError::Invariant(format!("merch item {} already exists", item.id)));
        }
        merch.insert(item.id, Arc::new(Mutex::new(item.clone())));
        Ok(())
    }

    async fn update_merch_item(
        &self,
        id: MerchItemId,
        update: MerchItemUpdate,
    ) -> Result<MerchItem> {
        let row = self
            .tables
            .merch_row(id)
            .await
            .ok_or_else(|| StoreError::not_found("merch item", id))?;
        let mut guard = lock_row(row, self.lock_timeout, "merch item").await?;

        let mut item = (*guard).clone();
        item.apply_update(update)?;
        *guard = item.clone();
        Ok(item)
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.tables.reservations.read().await.get(&id).cloned())
    }

    async fn list_reservations(&self, event_id: EventId) -> Result<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .tables
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.orders.read().await.get(&id).cloned())
    }

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
        Ok(self.tables.order_by_reference(reference).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Money;
    use domain::{OrderLine, OrderStatus, PaymentProcessor, Requester, ReservationKind};

    fn event(total_seats: u32) -> Event {
        Event {
            id: EventId::new(),
            title: "Rooftop Session".to_string(),
            starts_at: Utc::now(),
            venue: "The Yard".to_string(),
            location: None,
            description: None,
            total_seats,
            seats_taken: 0,
            status: EventStatus::Upcoming,
        }
    }

    fn mug(stock: u32) -> MerchItem {
        MerchItem {
            id: MerchItemId::new(),
            name: "Ceramic Mug".to_string(),
            description: None,
            price: Money::from_major(25),
            stock,
            category: "drinkware".to_string(),
        }
    }

    fn order(reference: &str, item: &MerchItem) -> Order {
        Order {
            id: OrderId::new(),
            external_payment_reference: reference.to_string(),
            processor: PaymentProcessor::Paystack,
            customer_email: "ada@example.com".to_string(),
            customer_name: "Ada".to_string(),
            lines: vec![OrderLine {
                merch_item_id: item.id,
                name: item.name.clone(),
                unit_price: item.price,
                quantity: 1,
            }],
            total_amount: item.price,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }

    fn reservation(event_id: EventId) -> Reservation {
        let requester = Requester::new("Ada", "ada@example.com", "+2348012345678").unwrap();
        Reservation::pending(
            event_id,
            requester,
            ReservationKind::Table,
            2,
            Default::default(),
        )
    }

    #[tokio::test]
    async fn commit_applies_staged_writes() {
        let store = InMemoryStore::new();
        let ev = event(10);
        store.create_event(&ev).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.lock_event(ev.id).await.unwrap().unwrap();
        tx.record_booking(ev.id, 2, EventStatus::Upcoming).await.unwrap();
        tx.insert_reservation(&reservation(ev.id)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_event(ev.id).await.unwrap().unwrap().seats_taken, 2);
        assert_eq!(store.list_reservations(ev.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let ev = event(10);
        store.create_event(&ev).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_event(ev.id).await.unwrap();
            tx.record_booking(ev.id, 4, EventStatus::Upcoming).await.unwrap();
            tx.insert_reservation(&reservation(ev.id)).await.unwrap();
        }

        assert_eq!(store.get_event(ev.id).await.unwrap().unwrap().seats_taken, 0);
        assert_eq!(store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn locked_row_times_out_as_contention() {
        let store = InMemoryStore::with_lock_timeout(Duration::from_millis(50));
        let ev = event(10);
        store.create_event(&ev).await.unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.lock_event(ev.id).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = waiter.lock_event(ev.id).await.unwrap_err();
        assert!(err.is_contention());
    }

    #[tokio::test]
    async fn waiter_sees_committed_state() {
        let store = InMemoryStore::new();
        let ev = event(10);
        store.create_event(&ev).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_event(ev.id).await.unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                tx.lock_event(ev.id).await.unwrap().unwrap().seats_taken
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        first.record_booking(ev.id, 3, EventStatus::Upcoming).await.unwrap();
        first.commit().await.unwrap();

        assert_eq!(waiter.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn booking_requires_the_row_lock() {
        let store = InMemoryStore::new();
        let ev = event(10);
        store.create_event(&ev).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .record_booking(ev.id, 1, EventStatus::Upcoming)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
    }

    #[tokio::test]
    async fn booking_past_capacity_is_an_invariant_violation() {
        let store = InMemoryStore::new();
        let ev = event(2);
        store.create_event(&ev).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.lock_event(ev.id).await.unwrap();
        let err = tx
            .record_booking(ev.id, 3, EventStatus::SoldOut)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
    }

    #[tokio::test]
    async fn duplicate_reference_is_rejected() {
        let store = InMemoryStore::new();
        let item = mug(5);
        store.create_merch_item(&item).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order("ref-1", &item)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_order(&order("ref-1", &item)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateReference(_)));
    }

    #[tokio::test]
    async fn duplicate_reference_is_caught_at_commit() {
        let store = InMemoryStore::new();
        let item = mug(5);
        store.create_merch_item(&item).await.unwrap();

        // Neither transaction takes the reference lock.
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.insert_order(&order("ref-2", &item)).await.unwrap();
        b.insert_order(&order("ref-2", &item)).await.unwrap();

        a.commit().await.unwrap();
        let err = b.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateReference(_)));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn reference_lock_serializes_transactions() {
        let store = InMemoryStore::with_lock_timeout(Duration::from_millis(50));

        let mut a = store.begin().await.unwrap();
        a.lock_payment_reference("ref-3").await.unwrap();
        a.lock_payment_reference("ref-3").await.unwrap();

        let mut b = store.begin().await.unwrap();
        assert!(b.lock_payment_reference("ref-3").await.unwrap_err().is_contention());
        b.lock_payment_reference("ref-4").await.unwrap();

        drop(a);
        let mut c = store.begin().await.unwrap();
        c.lock_payment_reference("ref-3").await.unwrap();
    }

    #[tokio::test]
    async fn reference_locks_are_pruned_once_released() {
        let store = InMemoryStore::with_lock_timeout(Duration::from_millis(50));
        let held = |store: &InMemoryStore| store.tables.references.lock().unwrap().len();

        let mut committed = store.begin().await.unwrap();
        committed.lock_payment_reference("ref-5").await.unwrap();
        assert_eq!(held(&store), 1);
        committed.commit().await.unwrap();
        assert_eq!(held(&store), 0);

        let mut holder = store.begin().await.unwrap();
        holder.lock_payment_reference("ref-6").await.unwrap();
        let mut waiter = store.begin().await.unwrap();
        assert!(waiter.lock_payment_reference("ref-6").await.is_err());
        assert_eq!(held(&store), 1);

        drop(holder);
        drop(waiter);
        assert_eq!(held(&store), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_restores_stock() {
        let store = InMemoryStore::new();
        let item = mug(5);
        store.create_merch_item(&item).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_payment_reference("ref-7").await.unwrap();
            let locked = tx.lock_merch_item(item.id).await.unwrap().unwrap();
            tx.set_stock(item.id, locked.take(4).unwrap()).await.unwrap();
            tx.insert_order(&order("ref-7", &item)).await.unwrap();
        }

        assert_eq!(store.get_merch_item(item.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.order_count().await, 0);
        assert!(store.find_order_by_reference("ref-7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stock_write_is_visible_after_commit() {
        let store = InMemoryStore::new();
        let item = mug(5);
        store.create_merch_item(&item).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let locked = tx.lock_merch_item(item.id).await.unwrap().unwrap();
        tx.set_stock(item.id, locked.take(2).unwrap()).await.unwrap();
        assert_eq!(tx.lock_merch_item(item.id).await.unwrap().unwrap().stock, 3);
        tx.commit().await.unwrap();

        assert_eq!(store.get_merch_item(item.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn update_event_keeps_the_ledger() {
        let store = InMemoryStore::new();
        let mut ev = event(4);
        ev.seats_taken = 3;
        store.create_event(&ev).await.unwrap();

        let err = store
            .update_event(
                ev.id,
                EventUpdate {
                    total_seats: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let updated = store
            .update_event(
                ev.id,
                EventUpdate {
                    total_seats: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.seats_taken, 3);
        assert_eq!(updated.status, EventStatus::SoldOut);
    }

    #[tokio::test]
    async fn missing_rows() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_event(EventId::new()).await.unwrap().is_none());
        assert!(tx.lock_merch_item(MerchItemId::new()).await.unwrap().is_none());
        assert!(matches!(
            store
                .update_merch_item(MerchItemId::new(), Default::default())
                .await
                .unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }
}
