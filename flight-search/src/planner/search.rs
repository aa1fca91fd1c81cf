//! Rolling-window trip search.
//!
//! Scans departure dates one day at a time. For each date it searches round
//! trips returning around the target return date, and stops at the first
//! date that yields a trip matching the requested length.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{AirportCode, Flight, SearchRequest, TripType};
use crate::eligibility::{EligibilityAnnotation, EligibilityEngine};
use crate::provider::{SearchTransport, TransportError};

use super::config::PlannerConfig;
use super::rank::{deduplicate, rank_trips};

/// Longest trip the planner will look for (one year).
const MAX_TRIP_HOURS: f64 = 366.0 * 24.0;

/// Error from trip planning.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Invalid trip request
    #[error("invalid trip request: {0}")]
    InvalidRequest(String),

    /// A search for candidate flights failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Unit of a trip length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Days,
    Hours,
}

impl DurationUnit {
    /// Convert an amount in this unit to hours.
    pub fn to_hours(self, amount: f64) -> f64 {
        match self {
            DurationUnit::Days => amount * 24.0,
            DurationUnit::Hours => amount,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Hours => "hours",
        }
    }
}

/// Request for trip planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlanRequest {
    pub origins: Vec<AirportCode>,
    pub destinations: Vec<AirportCode>,
    /// First departure date to try.
    pub departure_date: NaiveDate,
    /// Desired trip length, in `trip_length_unit`.
    pub trip_length: f64,
    #[serde(default)]
    pub trip_length_unit: DurationUnit,
    #[serde(default)]
    pub nonstop_preferred: bool,
    /// Upper bound on trip length, in `max_trip_duration_unit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trip_duration: Option<f64>,
    #[serde(default)]
    pub max_trip_duration_unit: DurationUnit,
}

impl TripPlanRequest {
    /// Validate the trip request.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.origins.is_empty() {
            return Err(PlanError::InvalidRequest("no origins".to_string()));
        }
        if self.destinations.is_empty() {
            return Err(PlanError::InvalidRequest("no destinations".to_string()));
        }
        if !self.trip_length.is_finite() || self.trip_length <= 0.0 {
            return Err(PlanError::InvalidRequest(
                "trip length must be positive".to_string(),
            ));
        }
        if self.target_hours() > MAX_TRIP_HOURS {
            return Err(PlanError::InvalidRequest(
                "trip length must be at most 366 days".to_string(),
            ));
        }
        if let Some(max) = self.max_trip_duration
            && (!max.is_finite() || max <= 0.0)
        {
            return Err(PlanError::InvalidRequest(
                "maximum trip duration must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Requested trip length in hours.
    pub fn target_hours(&self) -> f64 {
        self.trip_length_unit.to_hours(self.trip_length)
    }

    /// Maximum trip length in hours, if bounded.
    pub fn max_hours(&self) -> Option<f64> {
        self.max_trip_duration
            .map(|max| self.max_trip_duration_unit.to_hours(max))
    }

    /// Human-readable target, e.g. `"4 days"`.
    pub fn target_label(&self) -> String {
        format!("{} {}", self.trip_length, self.trip_length_unit.as_str())
    }

    /// Return dates to search for a departure on `departure`: the target
    /// return date and `flex_days` either side, never before departure.
    /// Dates past the end of the calendar are dropped.
    fn return_dates(&self, departure: NaiveDate, flex_days: u32) -> Vec<NaiveDate> {
        let target_minutes = (self.target_hours() * 60.0).round() as i64;
        let Some(target_return) = departure
            .and_hms_opt(0, 0, 0)
            .zip(Duration::try_minutes(target_minutes))
            .and_then(|(midnight, length)| midnight.checked_add_signed(length))
            .map(|end| end.date())
        else {
            return Vec::new();
        };

        let flex = i64::from(flex_days);
        (-flex..=flex)
            .filter_map(|offset| target_return.checked_add_signed(Duration::days(offset)))
            .filter(|date| *date >= departure)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One round trip that fits the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripOption {
    #[serde(flatten)]
    pub flight: Flight,
    /// Outbound departure to return arrival.
    pub trip_hours: f64,
    /// Distance from the requested length.
    pub deviation_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<EligibilityAnnotation>,
}

impl TripOption {
    /// Whether both legs are nonstop.
    pub fn is_nonstop(&self) -> bool {
        self.flight.total_stops() == 0
    }

    /// Combined fare of both legs, if every leg is priced.
    pub fn total_price(&self) -> Option<f64> {
        let outbound = self.flight.price?;
        match &self.flight.return_flight {
            Some(ret) => ret.price.map(|p| outbound + p),
            None => Some(outbound),
        }
    }

    /// Identifies the pair of flights making up the trip.
    pub(crate) fn identity(&self) -> (String, NaiveDate, Option<(String, NaiveDate)>) {
        (
            self.flight.flight_number.clone(),
            self.flight.departure_date,
            self.flight
                .return_flight
                .as_ref()
                .map(|r| (r.flight_number.clone(), r.departure_date)),
        )
    }
}

/// Result of trip planning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPlanResult {
    /// Best trips, ranked best-first.
    pub flights: Vec<TripOption>,
    /// Number of matching trips before truncation.
    pub total_options: usize,
    pub target_duration: String,
    /// Number of departure dates scanned.
    pub days_searched: u32,
    /// The departure date that produced the matches, if any did.
    pub earliest_departure: Option<NaiveDate>,
}

/// Trip planner over a search transport.
///
/// Planner results are not cached: they depend on a whole date range rather
/// than one request.
pub struct TripPlanner<'a, T: SearchTransport> {
    transport: &'a T,
    config: &'a PlannerConfig,
    eligibility: Option<&'a EligibilityEngine>,
}

impl<'a, T: SearchTransport> TripPlanner<'a, T> {
    /// Create a new planner.
    pub fn new(transport: &'a T, config: &'a PlannerConfig) -> Self {
        Self {
            transport,
            config,
            eligibility: None,
        }
    }

    /// Annotate returned trips with pass eligibility.
    pub fn with_eligibility(mut self, engine: &'a EligibilityEngine) -> Self {
        self.eligibility = Some(engine);
        self
    }

    /// Find the earliest departure date with trips matching the request.
    pub async fn plan(&self, request: &TripPlanRequest) -> Result<TripPlanResult, PlanError> {
        request.validate()?;

        let mut candidates: Vec<Flight> = Vec::new();
        let mut matches: Vec<TripOption> = Vec::new();
        let mut days_searched = 0;
        let mut earliest_departure = None;

        for day in 0..self.config.max_days {
            let Some(departure) = request
                .departure_date
                .checked_add_signed(Duration::days(i64::from(day)))
            else {
                break;
            };
            days_searched = day + 1;
            debug!(%departure, day = days_searched, max_days = self.config.max_days, "searching departure date");

            for return_date in request.return_dates(departure, self.config.return_flex_days) {
                let search = SearchRequest {
                    origins: request.origins.clone(),
                    destinations: request.destinations.clone(),
                    trip_type: TripType::RoundTrip,
                    departure_date: departure,
                    return_date: Some(return_date),
                };
                let response = self.transport.fetch_once(&search).await?;
                candidates.extend(response.flights);
            }

            matches = self.matching_trips(&candidates, request);
            if !matches.is_empty() {
                info!(%departure, trips = matches.len(), day = days_searched, "found matching trips");
                earliest_departure = Some(departure);
                break;
            }
        }

        let ranked = rank_trips(deduplicate(matches), request.nonstop_preferred);
        let total_options = ranked.len();

        let mut flights: Vec<TripOption> = ranked.into_iter().take(self.config.max_results).collect();
        if let Some(engine) = self.eligibility {
            for trip in &mut flights {
                trip.eligibility = Some(engine.annotate(&trip.flight));
            }
        }

        Ok(TripPlanResult {
            flights,
            total_options,
            target_duration: request.target_label(),
            days_searched,
            earliest_departure,
        })
    }

    /// Round trips whose length is within the flex window of the target and
    /// not above the maximum.
    fn matching_trips(&self, flights: &[Flight], request: &TripPlanRequest) -> Vec<TripOption> {
        let target = request.target_hours();
        let max = request.max_hours();
        let flex_hours = f64::from(self.config.return_flex_days) * 24.0;

        flights
            .iter()
            .filter(|f| f.return_flight.is_some())
            .filter_map(|flight| {
                let trip_hours = flight.trip_length().num_minutes() as f64 / 60.0;
                let deviation_hours = (trip_hours - target).abs();

                let within_flex = deviation_hours <= flex_hours;
                let within_max = max.is_none_or(|max| trip_hours <= max);
                (within_flex && within_max && trip_hours > 0.0).then(|| TripOption {
                    flight: flight.clone(),
                    trip_hours,
                    deviation_hours,
                    eligibility: None,
                })
            })
            .collect()
    }
}
