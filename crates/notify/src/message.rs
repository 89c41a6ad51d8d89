use chrono::{DateTime, Utc};
use common::{Money, OrderId, ReservationId};
use domain::{Event, Order, OrderLine, Reservation, ReservationKind};
use serde::Serialize;

/// Something that happened and that the customer should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ReservationReceived {
        reservation_id: ReservationId,
        to: String,
        name: String,
        event_title: String,
        event_date: DateTime<Utc>,
        kind: ReservationKind,
        seats: u32,
        phone: Option<String>,
    },
    OrderConfirmed {
        order_id: OrderId,
        to: String,
        name: String,
        lines: Vec<OrderLine>,
        total: Money,
    },
}

impl Notification {
    pub fn reservation_received(reservation: &Reservation, event: &Event) -> Self {
        let phone = reservation.requester.phone.trim();
        Notification::ReservationReceived {
            reservation_id: reservation.id,
            to: reservation.requester.email.clone(),
            name: reservation.requester.name.clone(),
            event_title: event.title.clone(),
            event_date: event.starts_at,
            kind: reservation.kind,
            seats: reservation.seats,
            phone: (!phone.is_empty()).then(|| phone.to_string()),
        }
    }

    pub fn order_confirmed(order: &Order) -> Self {
        Notification::OrderConfirmed {
            order_id: order.id,
            to: order.customer_email.clone(),
            name: order.customer_name.clone(),
            lines: order.lines.clone(),
            total: order.total_amount,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ReservationReceived { .. } => "reservation_received",
            Notification::OrderConfirmed { .. } => "order_confirmed",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::ReservationReceived { to, .. }
            | Notification::OrderConfirmed { to, .. } => {
                to
            }
        }
    }
}

/// A rendered email, ready for a [`crate::Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}
