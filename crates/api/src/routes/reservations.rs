//! Public reservation form endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use commerce::ReservationRequest;
use domain::Reservation;
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

/// POST /reservations: books a free ticket or a paid table.
#[tracing::instrument(skip_all, fields(user_id = ?caller.user_id))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    payload: Result<Json<ReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let Json(request) = payload?;
    let reservation = state.reservations.reserve(request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}
