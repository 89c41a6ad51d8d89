//! Reservations: free tickets and paid tables.

use chrono::{DateTime, Utc};
use common::{EventId, ReservationId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;

/// What a reservation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReservationKind {
    /// Free entry. Always one unit and not counted against the seat ceiling.
    #[default]
    Ticket,
    /// Paid table booking. Consumes `seats` from the event's capacity.
    Table,
}

impl ReservationKind {
    /// Units the reservation consumes: tickets are forced to one, tables must
    /// ask for at least one.
    pub fn units(&self, requested: u32) -> Result<u32, ValidationError> {
        match self {
            ReservationKind::Ticket => Ok(1),
            ReservationKind::Table if requested == 0 => {
                Err(ValidationError::new("seats", "must be at least 1"))
            }
            ReservationKind::Table => Ok(requested),
        }
    }

    pub fn counts_against_capacity(&self) -> bool {
        matches!(self, ReservationKind::Table)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::Ticket => "ticket",
            ReservationKind::Table => "table",
        }
    }
}

impl std::fmt::Display for ReservationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticket" => Ok(ReservationKind::Ticket),
            "table" => Ok(ReservationKind::Table),
            other => Err(ValidationError::new(
                "type",
                format!("unknown reservation type '{other}'"),
            )),
        }
    }
}

/// Reservation lifecycle. Confirmation and cancellation are admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(ValidationError::new(
                "status",
                format!("unknown reservation status '{other}'"),
            )),
        }
    }
}

/// Contact details of the person reserving. Construct through [`Requester::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Requester {
    pub fn new(
        name: impl AsRef<str>,
        email: impl AsRef<str>,
        phone: impl AsRef<str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: validation::non_empty("name", name.as_ref())?,
            email: validation::email(email.as_ref())?,
            phone: validation::phone(phone.as_ref())?,
        })
    }
}

/// Optional social/referral details collected by the reservation form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMetadata {
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub role: Option<String>,
    pub referral: Option<String>,
}

impl SocialMetadata {
    /// Drops blank entries.
    pub fn normalized(self) -> Self {
        Self {
            instagram: validation::optional(self.instagram),
            twitter: validation::optional(self.twitter),
            role: validation::optional(self.role),
            referral: validation::optional(self.referral),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub event_id: EventId,
    pub requester: Requester,
    pub kind: ReservationKind,
    pub seats: u32,
    pub status: ReservationStatus,
    pub social: SocialMetadata,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// A fresh `pending` reservation. `seats` must already be normalized by
    /// [`ReservationKind::units`].
    pub fn pending(
        event_id: EventId,
        requester: Requester,
        kind: ReservationKind,
        seats: u32,
        social: SocialMetadata,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            event_id,
            requester,
            kind,
            seats,
            status: ReservationStatus::Pending,
            social: social.normalized(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_coerced_to_one_unit() {
        assert_eq!(ReservationKind::Ticket.units(0).unwrap(), 1);
        assert_eq!(ReservationKind::Ticket.units(7).unwrap(), 1);
    }

    #[test]
    fn tables_need_a_positive_count() {
        assert_eq!(ReservationKind::Table.units(3).unwrap(), 3);
        assert_eq!(ReservationKind::Table.units(0).unwrap_err().field, "seats");
    }

    #[test]
    fn only_tables_count_against_capacity() {
        assert!(ReservationKind::Table.counts_against_capacity());
        assert!(!ReservationKind::Ticket.counts_against_capacity());
    }

    #[test]
    fn requester_requires_all_contact_fields() {
        assert!(Requester::new("Ada", "ada@offgrid.com", "+49 30 1234567").is_ok());
        assert_eq!(
            Requester::new(" ", "ada@offgrid.com", "+49 30 1234567")
                .unwrap_err()
                .field,
            "name"
        );
        assert_eq!(
            Requester::new("Ada", "ada.offgrid.com", "+49 30 1234567")
                .unwrap_err()
                .field,
            "email"
        );
        assert_eq!(
            Requester::new("Ada", "ada@offgrid.com", "")
                .unwrap_err()
                .field,
            "phone"
        );
    }

    #[test]
    fn kind_deserializes_lowercase() {
        let kind: ReservationKind = serde_json::from_str("\"table\"").unwrap();
        assert_eq!(kind, ReservationKind::Table);
    }

    #[test]
    fn new_reservation_is_pending() {
        let requester = Requester::new("Ada", "ada@offgrid.com", "+49 30 1234567").unwrap();
        let social = SocialMetadata {
            instagram: Some(" ".to_string()),
            referral: Some("friend".to_string()),
            ..Default::default()
        };
        let r = Reservation::pending(EventId::new(), requester, ReservationKind::Table, 2, social);
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.social.instagram, None);
        assert_eq!(r.social.referral.as_deref(), Some("friend"));
    }
}
