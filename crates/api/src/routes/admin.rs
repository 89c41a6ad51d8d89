//! Admin endpoints. Every handler requires the `admin` role.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EventId, MerchItemId};
use domain::{EventUpdate, MerchItem, MerchItemUpdate, NewEvent, NewMerchItem, Reservation};
use store::Store;

use super::catalog::EventView;
use super::parse_path;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Admin;

/// POST /admin/events
#[tracing::instrument(skip_all, fields(admin = ?admin.user_id))]
pub async fn create_event<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(admin): Admin,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<EventView>), ApiError> {
    let Json(input) = payload?;
    let event = state.catalog.create_event(input).await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

/// PATCH /admin/events/{id}
///
/// Moves the ceiling or edits details. `seats_taken` is not accepted.
#[tracing::instrument(skip_all, fields(admin = ?admin.user_id, event_id = %id))]
pub async fn update_event<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(admin): Admin,
    Path(id): Path<String>,
    payload: Result<Json<EventUpdate>, JsonRejection>,
) -> Result<Json<EventView>, ApiError> {
    let id: EventId = parse_path("event id", &id)?;
    let Json(update) = payload?;
    let event = state.catalog.update_event(id, update).await?;
    Ok(Json(event.into()))
}

/// GET /admin/events/{id}/reservations
pub async fn list_reservations<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    Path(id): Path<String>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let id: EventId = parse_path("event id", &id)?;
    Ok(Json(state.catalog.list_reservations(id).await?))
}

/// POST /admin/merch
#[tracing::instrument(skip_all, fields(admin = ?admin.user_id))]
pub async fn create_merch_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(admin): Admin,
    payload: Result<Json<NewMerchItem>, JsonRejection>,
) -> Result<(StatusCode, Json<MerchItem>), ApiError> {
    let Json(input) = payload?;
    let item = state.catalog.create_merch_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /admin/merch/{id}
#[tracing::instrument(skip_all, fields(admin = ?admin.user_id, item_id = %id))]
pub async fn update_merch_item<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(admin): Admin,
    Path(id): Path<String>,
    payload: Result<Json<MerchItemUpdate>, JsonRejection>,
) -> Result<Json<MerchItem>, ApiError> {
    let id: MerchItemId = parse_path("merch item id", &id)?;
    let Json(update) = payload?;
    Ok(Json(state.catalog.update_merch_item(id, update).await?))
}
