//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{AirportCode, Flight};
use crate::eligibility::CalendarDocument;
use crate::planner::DurationUnit;

/// Body of a search request.
///
/// Fields are loose so that a missing field produces a 400 with a message
/// rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    #[serde(default)]
    pub origins: Vec<String>,

    #[serde(default)]
    pub destinations: Vec<String>,

    /// `one-way`, `round-trip` or `trip-planner` (defaults to round-trip)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_type: Option<String>,

    /// YYYY-MM-DD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
}

/// Non-streaming search response.
#[derive(Debug, Serialize)]
pub struct SearchApiResponse {
    pub flights: Vec<Flight>,

    /// Whether the flights came from the server's cache
    pub cached: bool,

    pub count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,

    /// The request as received
    #[serde(rename = "searchParams")]
    pub search_params: SearchBody,
}

/// Body of a trip-planner request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlanBody {
    #[serde(default)]
    pub origins: Vec<String>,

    #[serde(default)]
    pub destinations: Vec<String>,

    pub departure_date: Option<String>,

    /// Desired trip length
    pub trip_length: Option<f64>,

    #[serde(default)]
    pub trip_length_unit: DurationUnit,

    #[serde(default)]
    pub nonstop_preferred: bool,

    pub max_trip_duration: Option<f64>,

    #[serde(default)]
    pub max_trip_duration_unit: DurationUnit,
}

/// Destinations the provider knows about.
#[derive(Debug, Serialize)]
pub struct DestinationsResponse {
    pub destinations: Vec<AirportCode>,
    pub count: usize,
}

/// Service banner served at `/`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub data_source: &'static str,
    /// Where the installed blackout calendar came from
    pub calendar_source: String,
}

/// Cache statistics.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Response to a calendar refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    pub data: CalendarDocument,
}

/// A plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
