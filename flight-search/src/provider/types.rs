//! Provider wire types.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::domain::{Flight, RawFlight};

use super::error::MalformedEvent;

/// One event of a streaming search.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Flights found on one route.
    Flights {
        route: Option<String>,
        count: Option<usize>,
        flights: Vec<Flight>,
    },
    /// The provider switched to another airline's data.
    FallbackNotice {
        notice: String,
        airline: Option<String>,
    },
    /// A provider-side error. The stream may continue.
    Error(String),
    /// The search finished.
    Complete { total_flights: Option<usize> },
}

/// Every field any event kind may carry.
#[derive(Deserialize)]
struct WireEvent {
    route: Option<String>,
    flights: Option<Vec<serde_json::Value>>,
    count: Option<usize>,
    fallback_notice: Option<String>,
    fallback_airline: Option<String>,
    error: Option<String>,
    complete: Option<bool>,
    total_flights: Option<usize>,
}

impl StreamEvent {
    /// Parse the JSON payload of one `data:` event.
    pub fn parse(data: &str) -> Result<Self, MalformedEvent> {
        let wire: WireEvent =
            serde_json::from_str(data).map_err(|e| MalformedEvent::new(e.to_string(), data))?;

        if wire.complete == Some(true) {
            return Ok(StreamEvent::Complete {
                total_flights: wire.total_flights,
            });
        }
        if let Some(flights) = wire.flights {
            return Ok(StreamEvent::Flights {
                route: wire.route,
                count: wire.count,
                flights: normalize_flights(flights),
            });
        }
        if let Some(notice) = wire.fallback_notice {
            return Ok(StreamEvent::FallbackNotice {
                notice,
                airline: wire.fallback_airline,
            });
        }
        if let Some(error) = wire.error {
            return Ok(StreamEvent::Error(error));
        }
        Err(MalformedEvent::new("unrecognized event", data))
    }

    /// Render as an SSE frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            StreamEvent::Flights {
                route,
                count,
                flights,
            } => {
                if let Some(route) = route {
                    map.serialize_entry("route", route)?;
                }
                map.serialize_entry("flights", flights)?;
                map.serialize_entry("count", &count.unwrap_or(flights.len()))?;
            }
            StreamEvent::FallbackNotice { notice, airline } => {
                map.serialize_entry("fallback_notice", notice)?;
                if let Some(airline) = airline {
                    map.serialize_entry("fallback_airline", airline)?;
                }
            }
            StreamEvent::Error(message) => map.serialize_entry("error", message)?,
            StreamEvent::Complete { total_flights } => {
                map.serialize_entry("complete", &true)?;
                if let Some(total) = total_flights {
                    map.serialize_entry("total_flights", total)?;
                }
            }
        }
        map.end()
    }
}

/// Normalize provider flights, dropping (and logging) any that do not
/// describe a usable flight.
pub fn normalize_flights(raw: Vec<serde_json::Value>) -> Vec<Flight> {
    raw.into_iter()
        .filter_map(|value| {
            let parsed = serde_json::from_value::<RawFlight>(value)
                .map_err(|e| e.to_string())
                .and_then(|raw| Flight::from_raw(raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(flight) => Some(flight),
                Err(e) => {
                    warn!(error = %e, "skipping unusable flight");
                    None
                }
            }
        })
        .collect()
}

/// Body of a non-streaming search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireSearchResponse {
    #[serde(default)]
    pub flights: Vec<serde_json::Value>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub fallback_notice: Option<String>,
    #[serde(default)]
    pub fallback_airline: Option<String>,
}

/// A normalized non-streaming search response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub flights: Vec<Flight>,
    pub data_source: Option<String>,
    pub fallback_notice: Option<String>,
    pub fallback_airline: Option<String>,
}

impl SearchResponse {
    pub fn new(flights: Vec<Flight>) -> Self {
        Self {
            flights,
            ..Self::default()
        }
    }
}

impl From<WireSearchResponse> for SearchResponse {
    fn from(wire: WireSearchResponse) -> Self {
        Self {
            flights: normalize_flights(wire.flights),
            data_source: wire.data_source,
            fallback_notice: wire.fallback_notice,
            fallback_airline: wire.fallback_airline,
        }
    }
}
