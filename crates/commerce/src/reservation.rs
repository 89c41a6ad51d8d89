//! Reservation transaction: validates a request, books seats against the
//! event's capacity ledger and queues the confirmation email.

use std::time::Instant;

use common::EventId;
use domain::{Event, Requester, Reservation, ReservationKind, SocialMetadata};
use notify::{Dispatcher, Notification};
use serde::Deserialize;
use store::{Store, StoreTx};

use crate::{CommerceError, Result};

/// A reservation as submitted by the public form.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub event_id: EventId,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "type", default)]
    pub kind: ReservationKind,
    /// Tables booked. Ignored for tickets.
    #[serde(default)]
    pub seats: u32,
    #[serde(flatten)]
    pub social: SocialMetadata,
}

pub struct ReservationService<S: Store> {
    store: S,
    dispatcher: Dispatcher,
}

impl<S: Store> ReservationService<S> {
    pub fn new(store: S, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Books a reservation.
    ///
    /// Validation runs before any lock is taken. The event row stays locked
    /// from the capacity check through commit, so concurrent table bookings
    /// for one event are applied one at a time and can never oversell.
    /// Tickets are recorded without touching the seat ledger.
    #[tracing::instrument(
        skip(self, request),
        fields(event_id = %request.event_id, kind = %request.kind)
    )]
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Reservation> {
        let start = Instant::now();
        let result = self.book(request).await;

        let outcome = match &result {
            Ok(_) => "booked",
            Err(e) => e.outcome(),
        };
        metrics::counter!("reservations_total", "outcome" => outcome).increment(1);
        metrics::histogram!("reservation_duration_seconds").record(start.elapsed().as_secs_f64());

        let (reservation, event) = match result {
            Ok(booked) => booked,
            Err(e) => {
                tracing::warn!(error = %e, outcome, "reservation rejected");
                return Err(e);
            }
        };

        tracing::info!(
            reservation_id = %reservation.id,
            seats = reservation.seats,
            seats_taken = event.seats_taken,
            "reservation booked"
        );
        self.dispatcher
            .dispatch(Notification::reservation_received(&reservation, &event));
        Ok(reservation)
    }

    /// The atomic unit. Returns the reservation and the event as committed.
    async fn book(&self, request: ReservationRequest) -> Result<(Reservation, Event)> {
        let requester = Requester::new(&request.name, &request.email, &request.phone)?;
        let seats = request.kind.units(request.seats)?;

        let mut tx = self.store.begin().await?;
        let mut event = tx
            .lock_event(request.event_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("event", request.event_id))?;

        let projected = if request.kind.counts_against_capacity() {
            Some(event.project_booking(seats)?)
        } else {
            None
        };

        let reservation = Reservation::pending(
            event.id,
            requester,
            request.kind,
            seats,
            request.social,
        );
        tx.insert_reservation(&reservation).await?;

        if let Some(seats_taken) = projected {
            let status = event.status_for(seats_taken);
            tx.record_booking(event.id, seats_taken, status).await?;
            event.seats_taken = seats_taken;
            event.status = status;
        }

        tx.commit().await?;
        Ok((reservation, event))
    }
}
