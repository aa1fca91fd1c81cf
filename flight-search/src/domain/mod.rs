//! Domain types for the flight search core.
//!
//! All types enforce their invariants at construction time: airport codes
//! are validated, and provider flight payloads are normalized once at the
//! boundary into the canonical [`Flight`] record.

mod airport;
mod error;
mod flight;
mod request;

pub use airport::{AirportCode, InvalidAirportCode};
pub use error::DomainError;
pub use flight::{Flight, RawFlight, RawPrice, parse_clock, parse_duration};
pub use request::{CacheKey, SearchRequest, TripType};
