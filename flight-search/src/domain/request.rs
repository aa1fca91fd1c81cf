//! Search requests and their cache identity.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AirportCode, DomainError};

/// Kind of trip being searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripType {
    OneWay,
    #[default]
    RoundTrip,
    TripPlanner,
}

impl TripType {
    /// Wire name of the trip type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "one-way",
            TripType::RoundTrip => "round-trip",
            TripType::TripPlanner => "trip-planner",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one-way" => Some(TripType::OneWay),
            "round-trip" => Some(TripType::RoundTrip),
            "trip-planner" => Some(TripType::TripPlanner),
            _ => None,
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point search across every origin/destination pair.
///
/// The order of `origins` and `destinations` is significant and is kept
/// verbatim, both on the wire and in the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub origins: Vec<AirportCode>,
    pub destinations: Vec<AirportCode>,
    #[serde(default)]
    pub trip_type: TripType,
    pub departure_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
}

impl SearchRequest {
    /// Create a one-way request.
    pub fn one_way(
        origins: Vec<AirportCode>,
        destinations: Vec<AirportCode>,
        departure_date: NaiveDate,
    ) -> Self {
        Self {
            origins,
            destinations,
            trip_type: TripType::OneWay,
            departure_date,
            return_date: None,
        }
    }

    /// Create a round-trip request.
    pub fn round_trip(
        origins: Vec<AirportCode>,
        destinations: Vec<AirportCode>,
        departure_date: NaiveDate,
        return_date: NaiveDate,
    ) -> Self {
        Self {
            origins,
            destinations,
            trip_type: TripType::RoundTrip,
            departure_date,
            return_date: Some(return_date),
        }
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.origins.is_empty() {
            return Err(DomainError::MissingField("origins"));
        }
        if self.destinations.is_empty() {
            return Err(DomainError::MissingField("destinations"));
        }
        if let Some(return_date) = self.return_date
            && return_date < self.departure_date
        {
            return Err(DomainError::ReturnBeforeDeparture {
                departure_date: self.departure_date,
                return_date,
            });
        }
        Ok(())
    }

    /// The cache identity of this request.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_request(self)
    }

    /// All (origin, destination) pairs in request order, skipping pairs
    /// where origin and destination coincide.
    pub fn routes(&self) -> Vec<(AirportCode, AirportCode)> {
        self.origins
            .iter()
            .flat_map(|o| self.destinations.iter().map(move |d| (*o, *d)))
            .filter(|(o, d)| o != d)
            .collect()
    }
}

/// Deterministic fingerprint of a [`SearchRequest`].
///
/// Layout: `ORIGINS>DESTINATIONS|trip-type|departure|return`, with codes
/// joined by `,` in request order and `-` for an absent return date.
/// Airport codes are letters only, so the separators cannot collide and the
/// encoding is injective over the request fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a request without reordering any field.
    pub fn for_request(request: &SearchRequest) -> Self {
        let join = |codes: &[AirportCode]| {
            codes
                .iter()
                .map(AirportCode::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };
        let return_date = request
            .return_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());

        CacheKey(format!(
            "{}>{}|{}|{}|{}",
            join(&request.origins),
            join(&request.destinations),
            request.trip_type,
            request.departure_date.format("%Y-%m-%d"),
            return_date,
        ))
    }

    /// Rebuild a key from its string form (as stored in a namespaced store).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CacheKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> AirportCode {
        AirportCode::parse(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn key_layout() {
        let req = SearchRequest::round_trip(
            vec![code("DEN"), code("ORD")],
            vec![code("LAS")],
            date("2026-03-10"),
            date("2026-03-14"),
        );
        assert_eq!(
            req.cache_key().as_str(),
            "DEN,ORD>LAS|round-trip|2026-03-10|2026-03-14"
        );

        let req = SearchRequest::one_way(vec![code("DEN")], vec![code("PHX")], date("2026-03-10"));
        assert_eq!(req.cache_key().as_str(), "DEN>PHX|one-way|2026-03-10|-");
    }

    #[test]
    fn swapping_origins_and_destinations_changes_key() {
        let a = SearchRequest::one_way(vec![code("ORD")], vec![code("CUN")], date("2026-02-01"));
        let b = SearchRequest::one_way(vec![code("CUN")], vec![code("ORD")], date("2026-02-01"));
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn origin_order_is_not_normalized() {
        let a = SearchRequest::one_way(
            vec![code("DEN"), code("ORD")],
            vec![code("LAS")],
            date("2026-02-01"),
        );
        let b = SearchRequest::one_way(
            vec![code("ORD"), code("DEN")],
            vec![code("LAS")],
            date("2026-02-01"),
        );
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn trip_type_and_return_date_participate() {
        let one_way = SearchRequest::one_way(vec![code("DEN")], vec![code("LAS")], date("2026-02-01"));
        let mut round = one_way.clone();
        round.trip_type = TripType::RoundTrip;
        assert_ne!(one_way.cache_key(), round.cache_key());

        let mut with_return = round.clone();
        with_return.return_date = Some(date("2026-02-05"));
        assert_ne!(round.cache_key(), with_return.cache_key());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = r#"{
            "origins": ["DEN"],
            "destinations": ["LAS", "PHX"],
            "tripType": "one-way",
            "departureDate": "2026-03-10"
        }"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.trip_type, TripType::OneWay);
        assert_eq!(req.destinations, vec![code("LAS"), code("PHX")]);
        assert_eq!(req.return_date, None);

        let out = serde_json::to_value(&req).unwrap();
        assert_eq!(out["departureDate"], "2026-03-10");
        assert_eq!(out["tripType"], "one-way");
        assert!(out.get("returnDate").is_none());
    }

    #[test]
    fn trip_type_defaults_to_round_trip() {
        let json = r#"{"origins": ["DEN"], "destinations": ["LAS"], "departureDate": "2026-03-10"}"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.trip_type, TripType::RoundTrip);
    }

    #[test]
    fn validate_rejects_empty_and_backwards() {
        let req = SearchRequest::one_way(vec![], vec![code("LAS")], date("2026-03-10"));
        assert_eq!(req.validate(), Err(DomainError::MissingField("origins")));

        let req = SearchRequest::one_way(vec![code("DEN")], vec![], date("2026-03-10"));
        assert_eq!(req.validate(), Err(DomainError::MissingField("destinations")));

        let req = SearchRequest::round_trip(
            vec![code("DEN")],
            vec![code("LAS")],
            date("2026-03-10"),
            date("2026-03-09"),
        );
        assert!(matches!(
            req.validate(),
            Err(DomainError::ReturnBeforeDeparture { .. })
        ));
    }

    #[test]
    fn routes_skip_self_pairs_and_keep_order() {
        let req = SearchRequest::one_way(
            vec![code("DEN"), code("LAS")],
            vec![code("LAS"), code("PHX")],
            date("2026-03-10"),
        );
        let routes: Vec<String> = req
            .routes()
            .iter()
            .map(|(o, d)| format!("{o}->{d}"))
            .collect();
        assert_eq!(routes, vec!["DEN->LAS", "DEN->PHX", "LAS->PHX"]);
    }

    #[test]
    fn trip_type_names() {
        for t in [TripType::OneWay, TripType::RoundTrip, TripType::TripPlanner] {
            assert_eq!(TripType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TripType::parse("multi-city"), None);
    }
}
