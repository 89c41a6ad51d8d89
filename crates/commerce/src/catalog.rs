//! Admin edits and public reads over the catalog.
//!
//! Nothing here moves `seats_taken` or takes stock; ceilings and restocks go
//! through the store's locked update paths.

use common::{EventId, MerchItemId, OrderId};
use domain::{
    Event, EventUpdate, MerchItem, MerchItemUpdate, NewEvent, NewMerchItem, Order, Reservation,
};
use store::Store;

use crate::{CommerceError, Result};

pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_event(&self, input: NewEvent) -> Result<Event> {
        let event = input.into_event()?;
        self.store.create_event(&event).await?;
        tracing::info!(event_id = %event.id, total_seats = event.total_seats, "event created");
        Ok(event)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_event(&self, id: EventId, update: EventUpdate) -> Result<Event> {
        let event = self.store.update_event(id, update).await?;
        tracing::info!(total_seats = event.total_seats, status = %event.status, "event updated");
        Ok(event)
    }

    pub async fn get_event(&self, id: EventId) -> Result<Event> {
        self.store
            .get_event(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("event", id))
    }

    /// Reservations for an event, oldest first.
    pub async fn list_reservations(&self, event_id: EventId) -> Result<Vec<Reservation>> {
        self.get_event(event_id).await?;
        Ok(self.store.list_reservations(event_id).await?)
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_merch_item(&self, input: NewMerchItem) -> Result<MerchItem> {
        let item = input.into_item()?;
        self.store.create_merch_item(&item).await?;
        tracing::info!(item_id = %item.id, stock = item.stock, "merch item created");
        Ok(item)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_merch_item(
        &self,
        id: MerchItemId,
        update: MerchItemUpdate,
    ) -> Result<MerchItem> {
        let item = self.store.update_merch_item(id, update).await?;
        tracing::info!(stock = item.stock, "merch item updated");
        Ok(item)
    }

    pub async fn get_merch_item(&self, id: MerchItemId) -> Result<MerchItem> {
        self.store
            .get_merch_item(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("merch item", id))
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| CommerceError::not_found("order", id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::Money;
    use store::InMemoryStore;

    use super::*;

    fn new_event(total_seats: u32) -> NewEvent {
        NewEvent {
            title: "Rooftop Session".to_string(),
            starts_at: Utc::now(),
            venue: "The Silent Space".to_string(),
            location: None,
            description: None,
            total_seats,
        }
    }

    #[tokio::test]
    async fn ceiling_can_grow() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let event = catalog.create_event(new_event(5)).await.unwrap();

        let updated = catalog
            .update_event(
                event.id,
                EventUpdate {
                    total_seats: Some(12),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_seats, 12);
        assert_eq!(updated.seats_taken, 0);
    }

    #[tokio::test]
    async fn restock_adds_units() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let item = catalog
            .create_merch_item(NewMerchItem {
                name: "Off-Grid Hoodie".to_string(),
                description: None,
                price: Money::from_major(55),
                stock: 3,
                category: "apparel".to_string(),
            })
            .await
            .unwrap();

        let updated = catalog
            .update_merch_item(
                item.id,
                MerchItemUpdate {
                    restock: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, 10);
    }

    #[tokio::test]
    async fn blank_title_is_invalid() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let mut input = new_event(5);
        input.title = "  ".to_string();
        assert!(matches!(
            catalog.create_event(input).await,
            Err(CommerceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let catalog = CatalogService::new(InMemoryStore::new());
        assert!(matches!(
            catalog.list_reservations(EventId::new()).await,
            Err(CommerceError::NotFound { kind: "event", .. })
        ));
        assert!(matches!(
            catalog.get_order(OrderId::new()).await,
            Err(CommerceError::NotFound { kind: "order", .. })
        ));
    }
}
