//! Checkout endpoints: open a processor session, then verify the payment.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use commerce::CheckoutRequest;
use common::OrderId;
use domain::PaymentProcessor;
use payments::CheckoutSession;
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_path;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub order_id: OrderId,
    /// `completed` on first verification, `already_processed` on replays.
    pub status: &'static str,
}

/// POST /checkout/{processor}/initialize
#[tracing::instrument(skip(state, payload))]
pub async fn initialize<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(processor): Path<String>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let processor: PaymentProcessor = parse_path("processor", &processor)?;
    let Json(request) = payload?;
    let session = state.checkout.initialize(processor, request).await?;
    Ok(Json(session))
}

/// POST /checkout/{processor}/verify
///
/// Answers 200 for both a new order and a replayed reference.
#[tracing::instrument(skip(state, payload))]
pub async fn verify<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(processor): Path<String>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let processor: PaymentProcessor = parse_path("processor", &processor)?;
    let Json(request) = payload?;
    let reconciliation = state.checkout.confirm(processor, &request.reference).await?;
    Ok(Json(VerifyResponse {
        order_id: reconciliation.order.id,
        status: reconciliation.outcome.as_str(),
    }))
}
