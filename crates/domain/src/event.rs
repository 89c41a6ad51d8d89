//! Scheduled events and their seat ledger.

use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};

use crate::error::{CapacityExceeded, ValidationError};
use crate::validation;

/// Public lifecycle of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Upcoming,
    SoldOut,
    Past,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::SoldOut => "sold_out",
            EventStatus::Past => "past",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(EventStatus::Upcoming),
            "sold_out" => Ok(EventStatus::SoldOut),
            "past" => Ok(EventStatus::Past),
            other => Err(ValidationError::new(
                "status",
                format!("unknown event status '{other}'"),
            )),
        }
    }
}

/// An event with a finite number of table seats.
///
/// `seats_taken` is the consumed side of the capacity ledger. Only a
/// committed table reservation moves it, and it never exceeds `total_seats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub total_seats: u32,
    pub seats_taken: u32,
    pub status: EventStatus,
}

impl Event {
    pub fn seats_available(&self) -> u32 {
        self.total_seats.saturating_sub(self.seats_taken)
    }

    /// Returns the `seats_taken` value after booking `seats` more, or the
    /// shortfall if that would overrun the ceiling.
    pub fn project_booking(&self, seats: u32) -> Result<u32, CapacityExceeded> {
        let projected = self.seats_taken.checked_add(seats);
        match projected {
            Some(projected) if projected <= self.total_seats => Ok(projected),
            _ => Err(CapacityExceeded {
                requested: seats,
                available: self.seats_available(),
            }),
        }
    }

    /// Status to persist alongside a new `seats_taken` value.
    pub fn status_for(&self, seats_taken: u32) -> EventStatus {
        match self.status {
            EventStatus::Upcoming if seats_taken >= self.total_seats => EventStatus::SoldOut,
            EventStatus::SoldOut if seats_taken < self.total_seats => EventStatus::Upcoming,
            status => status,
        }
    }

    /// Applies an admin edit. The ceiling may move but never below the seats
    /// already consumed.
    pub fn apply_update(&mut self, update: EventUpdate) -> Result<(), ValidationError> {
        if let Some(total_seats) = update.total_seats
            && total_seats < self.seats_taken
        {
            return Err(ValidationError::new(
                "total_seats",
                format!(
                    "cannot drop below the {} seats already taken",
                    self.seats_taken
                ),
            ));
        }

        if let Some(title) = update.title {
            self.title = validation::non_empty("title", &title)?;
        }
        if let Some(venue) = update.venue {
            self.venue = validation::non_empty("venue", &venue)?;
        }
        if let Some(starts_at) = update.starts_at {
            self.starts_at = starts_at;
        }
        if update.location.is_some() {
            self.location = validation::optional(update.location);
        }
        if update.description.is_some() {
            self.description = validation::optional(update.description);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(total_seats) = update.total_seats {
            self.total_seats = total_seats;
        }

        self.status = self.status_for(self.seats_taken);
        Ok(())
    }
}

/// Admin input for creating an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub total_seats: u32,
}

impl NewEvent {
    /// Validates the input and produces an event with an empty ledger.
    pub fn into_event(self) -> Result<Event, ValidationError> {
        Ok(Event {
            id: EventId::new(),
            title: validation::non_empty("title", &self.title)?,
            starts_at: self.starts_at,
            venue: validation::non_empty("venue", &self.venue)?,
            location: validation::optional(self.location),
            description: validation::optional(self.description),
            total_seats: self.total_seats,
            seats_taken: 0,
            status: EventStatus::Upcoming,
        })
    }
}

/// Admin edit. `seats_taken` is not editable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub total_seats: Option<u32>,
    pub status: Option<EventStatus>,
}
