//! Flight records and their normalization from provider payloads.
//!
//! Providers disagree on field names (`flightNumber` vs `flight_number`),
//! time formats (`18:15`, `06:15 PM`) and how durations and prices are
//! spelled. [`RawFlight`] accepts all of those shapes; [`Flight`] is the one
//! canonical record used everywhere downstream.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{AirportCode, DomainError};

/// Default currency when a provider omits one.
const DEFAULT_CURRENCY: &str = "USD";

/// A flight option: one leg, or an outbound leg owning its return leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub airline: String,
    pub flight_number: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: NaiveDate,
    pub arrival_time: NaiveTime,
    /// Block time in minutes, when known.
    pub duration_mins: Option<u32>,
    pub stops: u32,
    pub price: Option<f64>,
    pub currency: String,
    pub seats_remaining: Option<u32>,
    /// Whether the fare class is usable with a pass, before blackout rules.
    pub pass_eligible: bool,
    pub is_round_trip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_flight: Option<Box<Flight>>,
}

impl Flight {
    /// Departure as a local date-time.
    pub fn departure_at(&self) -> NaiveDateTime {
        self.departure_date.and_time(self.departure_time)
    }

    /// Arrival as a local date-time.
    pub fn arrival_at(&self) -> NaiveDateTime {
        self.arrival_date.and_time(self.arrival_time)
    }

    /// When the whole trip ends: the return leg's arrival if there is one.
    pub fn trip_end(&self) -> NaiveDateTime {
        self.return_flight
            .as_ref()
            .map(|r| r.arrival_at())
            .unwrap_or_else(|| self.arrival_at())
    }

    /// Time from outbound departure to the end of the trip.
    pub fn trip_length(&self) -> Duration {
        self.trip_end().signed_duration_since(self.departure_at())
    }

    /// Stops across outbound and return legs.
    pub fn total_stops(&self) -> u32 {
        self.stops + self.return_flight.as_ref().map_or(0, |r| r.stops)
    }

    /// Every calendar date on which a leg of this flight departs.
    pub fn travel_dates(&self) -> Vec<NaiveDate> {
        let mut dates = vec![self.departure_date];
        if let Some(ret) = &self.return_flight {
            dates.push(ret.departure_date);
        }
        dates
    }

    /// Render the duration in the `"3h 5m"` style providers use.
    pub fn duration_label(&self) -> Option<String> {
        self.duration_mins
            .map(|mins| format!("{}h {}m", mins / 60, mins % 60))
    }

    /// Normalize a provider payload into a canonical flight.
    pub fn from_raw(raw: RawFlight) -> Result<Self, DomainError> {
        let origin = parse_code("origin", raw.origin)?;
        let destination = parse_code("destination", raw.destination)?;

        let departure_date = parse_date(
            "departureDate",
            raw.departure_date
                .as_deref()
                .ok_or(DomainError::MissingField("departureDate"))?,
        )?;
        let departure_time = parse_clock(
            "departureTime",
            raw.departure_time
                .as_deref()
                .ok_or(DomainError::MissingField("departureTime"))?,
        )?;
        let arrival_time = parse_clock(
            "arrivalTime",
            raw.arrival_time
                .as_deref()
                .ok_or(DomainError::MissingField("arrivalTime"))?,
        )?;
        let arrival_date = match raw.arrival_date.as_deref() {
            Some(s) if !s.trim().is_empty() => parse_date("arrivalDate", s)?,
            // An arrival clock earlier than departure means the next day
            _ if arrival_time < departure_time => departure_date + Duration::days(1),
            _ => departure_date,
        };

        let duration_mins = match (raw.duration_mins, raw.duration.as_deref()) {
            (Some(mins), _) => Some(mins),
            (None, Some(text)) if !text.trim().is_empty() => Some(parse_duration(text)?),
            _ => {
                let minutes = arrival_date
                    .and_time(arrival_time)
                    .signed_duration_since(departure_date.and_time(departure_time))
                    .num_minutes();
                u32::try_from(minutes).ok()
            }
        };

        let price = match raw.price {
            None => None,
            Some(value) => value.into_price()?,
        };

        let return_flight = raw
            .return_flight
            .map(|r| Flight::from_raw(*r).map(Box::new))
            .transpose()?;

        Ok(Flight {
            origin,
            destination,
            airline: raw.airline.unwrap_or_default(),
            flight_number: raw
                .flight_number
                .filter(|s| !s.trim().is_empty())
                .ok_or(DomainError::MissingField("flightNumber"))?,
            departure_date,
            departure_time,
            arrival_date,
            arrival_time,
            duration_mins,
            stops: raw.stops.unwrap_or(0),
            price,
            currency: raw
                .currency
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            seats_remaining: raw.seats_remaining,
            pass_eligible: raw.pass_eligible.unwrap_or(false),
            is_round_trip: raw.is_round_trip.unwrap_or(false) || return_flight.is_some(),
            return_flight,
        })
    }
}

/// A flight as providers send it.
///
/// Every field is optional and accepts both camelCase and snake_case
/// spellings; validation happens in [`Flight::from_raw`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFlight {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub airline: Option<String>,
    #[serde(alias = "flight_number")]
    pub flight_number: Option<String>,
    #[serde(alias = "departure_date")]
    pub departure_date: Option<String>,
    #[serde(alias = "departure_time")]
    pub departure_time: Option<String>,
    #[serde(alias = "arrival_date")]
    pub arrival_date: Option<String>,
    #[serde(alias = "arrival_time")]
    pub arrival_time: Option<String>,
    pub duration: Option<String>,
    #[serde(alias = "duration_mins")]
    pub duration_mins: Option<u32>,
    pub stops: Option<u32>,
    pub price: Option<RawPrice>,
    pub currency: Option<String>,
    #[serde(alias = "seats_remaining")]
    pub seats_remaining: Option<u32>,
    #[serde(
        alias = "pass_eligible",
        alias = "gowild_eligible",
        alias = "gowildEligible"
    )]
    pub pass_eligible: Option<bool>,
    #[serde(alias = "is_round_trip")]
    pub is_round_trip: Option<bool>,
    #[serde(alias = "return_flight")]
    pub return_flight: Option<Box<RawFlight>>,
}

/// Prices arrive as numbers or as decimal strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    fn into_price(self) -> Result<Option<f64>, DomainError> {
        let value = match self {
            RawPrice::Number(n) => n,
            RawPrice::Text(s) if s.trim().is_empty() => return Ok(None),
            RawPrice::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| DomainError::InvalidPrice(s.clone()))?,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(DomainError::InvalidPrice(value.to_string()));
        }
        Ok(Some(value))
    }
}

fn parse_code(field: &'static str, value: Option<String>) -> Result<AirportCode, DomainError> {
    let value = value.ok_or(DomainError::MissingField(field))?;
    AirportCode::parse_normalized(&value)
        .map_err(|source| DomainError::InvalidAirport { field, source })
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, DomainError> {
    let trimmed = value.trim();
    // Accept a full timestamp by taking its date part
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| DomainError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Parse a wall-clock time in 24-hour (`18:15`, `18:15:00`) or 12-hour
/// (`6:15 PM`) form.
///
/// A 24-hour clock followed by a meridiem (`13:30 PM`) is taken as 24-hour.
pub fn parse_clock(field: &'static str, value: &str) -> Result<NaiveTime, DomainError> {
    let invalid = || DomainError::InvalidTime {
        field,
        value: value.to_string(),
    };

    let upper = value.trim().to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };

    let mut parts = clock.split(':');
    let hour: u32 = parts
        .next()
        .and_then(|h| h.parse().ok())
        .ok_or_else(invalid)?;
    let minute: u32 = parts
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or_else(invalid)?;
    let second: u32 = match parts.next() {
        Some(s) => s.parse().map_err(|_| invalid())?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }

    let hour = match meridiem {
        Some(true) if hour < 12 => hour + 12,
        Some(false) if hour == 12 => 0,
        _ => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)
}

/// Parse `"3h 45m"`, `"3h"`, `"45m"` or ISO-8601 `"PT3H45M"` into minutes.
pub fn parse_duration(value: &str) -> Result<u32, DomainError> {
    let invalid = || DomainError::InvalidDuration(value.to_string());
    let upper = value.trim().to_ascii_uppercase();
    let body = upper.strip_prefix("PT").unwrap_or(&upper);

    let mut total: u32 = 0;
    let mut digits = String::new();
    let mut saw_unit = false;

    for ch in body.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            'H' | 'M' => {
                let n: u32 = digits.parse().map_err(|_| invalid())?;
                total += if ch == 'H' { n * 60 } else { n };
                digits.clear();
                saw_unit = true;
            }
            ' ' => {}
            _ => return Err(invalid()),
        }
    }

    if !digits.is_empty() || !saw_unit {
        return Err(invalid());
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawFlight {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn normalizes_camel_case_payload() {
        let flight = Flight::from_raw(raw(
            r#"{
                "origin": "DEN", "destination": "LAS",
                "airline": "Frontier Airlines", "flightNumber": "F9-1234",
                "departureDate": "2026-03-10", "departureTime": "06:15 AM",
                "arrivalDate": "2026-03-10", "arrivalTime": "08:00 AM",
                "duration": "1h 45m", "stops": 0, "price": 59.0,
                "seatsRemaining": 4, "gowild_eligible": true
            }"#,
        ))
        .unwrap();

        assert_eq!(flight.origin.as_str(), "DEN");
        assert_eq!(flight.flight_number, "F9-1234");
        assert_eq!(flight.departure_time, NaiveTime::from_hms_opt(6, 15, 0).unwrap());
        assert_eq!(flight.duration_mins, Some(105));
        assert_eq!(flight.price, Some(59.0));
        assert_eq!(flight.currency, "USD");
        assert_eq!(flight.seats_remaining, Some(4));
        assert!(flight.pass_eligible);
        assert!(!flight.is_round_trip);
    }

    #[test]
    fn normalizes_snake_case_payload() {
        let flight = Flight::from_raw(raw(
            r#"{
                "origin": "den", "destination": "PHX",
                "airline": "Frontier Airlines", "flight_number": "F9-77",
                "departure_date": "2026-03-10", "departure_time": "18:30",
                "arrival_time": "20:05", "price": "104.50", "currency": "USD",
                "gowild_eligible": false, "booking_class": "Economy"
            }"#,
        ))
        .unwrap();

        assert_eq!(flight.origin.as_str(), "DEN");
        assert_eq!(flight.arrival_date, flight.departure_date);
        assert_eq!(flight.duration_mins, Some(95));
        assert_eq!(flight.price, Some(104.5));
        assert!(!flight.pass_eligible);
    }

    #[test]
    fn canonical_form_round_trips_through_raw() {
        let original = Flight::from_raw(raw(
            r#"{"origin": "ORD", "destination": "CUN", "flightNumber": "F9-9",
                "departureDate": "2026-01-15", "departureTime": "09:00",
                "arrivalTime": "13:10", "price": 88}"#,
        ))
        .unwrap();

        let json = serde_json::to_string(&original).unwrap();
        let again = Flight::from_raw(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(again, original);
    }

    #[test]
    fn overnight_arrival_moves_to_next_day() {
        let flight = Flight::from_raw(raw(
            r#"{"origin": "LAS", "destination": "MCO", "flightNumber": "F9-1",
                "departureDate": "2026-03-10", "departureTime": "11:40 PM",
                "arrivalTime": "06:55 AM"}"#,
        ))
        .unwrap();
        assert_eq!(
            flight.arrival_date,
            NaiveDate::from_ymd_opt(2026, 3, 11).unwrap()
        );
        assert_eq!(flight.duration_mins, Some(435));
    }

    #[test]
    fn embedded_return_leg_is_owned() {
        let flight = Flight::from_raw(raw(
            r#"{"origin": "DEN", "destination": "LAS", "flightNumber": "F9-10",
                "departureDate": "2026-03-10", "departureTime": "07:00",
                "arrivalTime": "08:30", "stops": 1,
                "returnFlight": {"origin": "LAS", "destination": "DEN",
                    "flightNumber": "F9-11", "departureDate": "2026-03-14",
                    "departureTime": "17:00", "arrivalTime": "19:20", "stops": 1}}"#,
        ))
        .unwrap();

        assert!(flight.is_round_trip);
        let ret = flight.return_flight.as_ref().unwrap();
        assert_eq!(ret.flight_number, "F9-11");
        assert_eq!(flight.total_stops(), 2);
        assert_eq!(flight.trip_length(), Duration::hours(4 * 24 + 12) + Duration::minutes(20));
        assert_eq!(flight.travel_dates().len(), 2);
    }

    #[test]
    fn missing_or_invalid_fields_are_rejected() {
        let err = Flight::from_raw(raw(r#"{"origin": "DEN"}"#)).unwrap_err();
        assert_eq!(err, DomainError::MissingField("destination"));

        let err = Flight::from_raw(raw(
            r#"{"origin": "DEN", "destination": "LAS", "flightNumber": "F9-1",
                "departureDate": "2026-03-10", "departureTime": "N/A", "arrivalTime": "09:00"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTime { field: "departureTime", .. }));

        let err = Flight::from_raw(raw(
            r#"{"origin": "DEN", "destination": "LAS", "flightNumber": "F9-1",
                "departureDate": "2026-03-10", "departureTime": "08:00",
                "arrivalTime": "09:00", "price": -5}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidPrice(_)));
    }

    #[test]
    fn clock_formats() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(parse_clock("t", "06:15").unwrap(), t(6, 15));
        assert_eq!(parse_clock("t", "18:15:00").unwrap(), t(18, 15));
        assert_eq!(parse_clock("t", "6:15 pm").unwrap(), t(18, 15));
        assert_eq!(parse_clock("t", "12:05 AM").unwrap(), t(0, 5));
        assert_eq!(parse_clock("t", "12:05 PM").unwrap(), t(12, 5));
        assert_eq!(parse_clock("t", "13:30 PM").unwrap(), t(13, 30));
        assert!(parse_clock("t", "25:00").is_err());
        assert!(parse_clock("t", "noon").is_err());
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration("3h 45m").unwrap(), 225);
        assert_eq!(parse_duration("3h").unwrap(), 180);
        assert_eq!(parse_duration("45m").unwrap(), 45);
        assert_eq!(parse_duration("PT2H5M").unwrap(), 125);
        assert!(parse_duration("3 hours").is_err());
        assert!(parse_duration("42").is_err());
    }
}
