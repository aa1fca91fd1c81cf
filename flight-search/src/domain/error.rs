//! Domain error types.
//!
//! These errors represent validation failures in the domain layer,
//! mostly raised while normalizing provider data. They are distinct from
//! transport and storage errors.

use super::InvalidAirportCode;

/// Domain-level errors for request validation and flight normalization.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// A required field was absent or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An airport code failed validation
    #[error("{field}: {source}")]
    InvalidAirport {
        field: &'static str,
        #[source]
        source: InvalidAirportCode,
    },

    /// A date string could not be parsed
    #[error("invalid date for {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    /// A time string could not be parsed
    #[error("invalid time for {field}: {value:?}")]
    InvalidTime { field: &'static str, value: String },

    /// A duration string could not be parsed
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    /// A price was present but not a finite, non-negative number
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Return date precedes departure date
    #[error("return date {return_date} is before departure date {departure_date}")]
    ReturnBeforeDeparture {
        departure_date: chrono::NaiveDate,
        return_date: chrono::NaiveDate,
    },
}
