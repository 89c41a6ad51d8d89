//! Public read endpoints for events, merchandise and orders.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{EventId, MerchItemId, OrderId};
use domain::{Event, MerchItem, Order};
use serde::Serialize;
use store::Store;

use super::parse_path;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub seats_available: u32,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            seats_available: event.seats_available(),
            event,
        }
    }
}

/// GET /events/{id}
pub async fn get_event<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<EventView>, ApiError> {
    let id: EventId = parse_path("event id", &id)?;
    let event = state.catalog.get_event(id).await?;
    Ok(Json(event.into()))
}

/// GET /merch/{id}
pub async fn get_merch_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<MerchItem>, ApiError> {
    let id: MerchItemId = parse_path("merch item id", &id)?;
    Ok(Json(state.catalog.get_merch_item(id).await?))
}

/// GET /orders/{id}
pub async fn get_order<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = parse_path("order id", &id)?;
    Ok(Json(state.catalog.get_order(id).await?))
}
