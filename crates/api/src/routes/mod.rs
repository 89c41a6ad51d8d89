//! HTTP handlers, grouped by resource.

pub mod admin;
pub mod catalog;
pub mod checkout;
pub mod ops;
pub mod reservations;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment, answering with the JSON error body rather than
/// axum's plain-text path rejection.
pub(crate) fn parse_path<T: FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use common::EventId;
    use domain::PaymentProcessor;

    use super::*;

    #[test]
    fn parses_ids_and_processors() {
        let id = EventId::new();
        assert_eq!(parse_path::<EventId>("event id", &id.to_string()).unwrap(), id);
        assert_eq!(
            parse_path::<PaymentProcessor>("processor", "paystack").unwrap(),
            PaymentProcessor::Paystack
        );
    }

    #[test]
    fn bad_segment_is_a_bad_request() {
        let err = parse_path::<EventId>("event id", "not-a-uuid").unwrap_err();
        assert_eq!(err.to_string(), "invalid event id: 'not-a-uuid'");
    }
}
