//! Deterministic synthetic flight data.
//!
//! Stands in for a live fare source. The same route and dates always produce
//! the same flights, so results are reproducible across runs of one build.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use futures::StreamExt;
use futures::stream::BoxStream;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::{AirportCode, Flight, SearchRequest};

use super::SearchTransport;
use super::decoder::ByteStream;
use super::error::TransportError;
use super::types::{SearchResponse, StreamEvent};

/// Label reported as the data source of generated results.
pub const DATA_SOURCE: &str = "mock";

const AIRLINE: &str = "Frontier Airlines";

/// Destinations searched when the request asks for `ANY`.
const POPULAR_DESTINATIONS: [&str; 5] = ["MCO", "LAS", "MIA", "PHX", "ATL"];

/// Configuration for the flight generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Mixed into every route's seed.
    pub seed: u64,
    /// Pause between routes when streaming.
    pub route_delay: Duration,
    /// Destinations searched per origin.
    pub max_destinations: usize,
    /// Flights generated per route, inclusive range in either order.
    pub flights_per_route: (usize, usize),
}

impl GeneratorConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_route_delay(mut self, delay: Duration) -> Self {
        self.route_delay = delay;
        self
    }

    pub fn with_flights_per_route(mut self, min: usize, max: usize) -> Self {
        self.flights_per_route = (min.min(max), max.max(min));
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            route_delay: Duration::from_millis(100),
            max_destinations: 5,
            flights_per_route: (1, 3),
        }
    }
}

/// Generates plausible flights for any route.
#[derive(Debug, Clone, Default)]
pub struct FlightGenerator {
    config: GeneratorConfig,
}

impl FlightGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Destinations served when a search asks for `ANY`.
    pub fn popular_destinations() -> Vec<AirportCode> {
        POPULAR_DESTINATIONS
            .iter()
            .filter_map(|code| AirportCode::parse(code).ok())
            .collect()
    }

    /// Routes searched for `request`, in request order.
    ///
    /// A wildcard destination list expands to the popular destinations.
    /// Routes whose origin and destination coincide are skipped.
    pub fn routes(&self, request: &SearchRequest) -> Vec<(AirportCode, AirportCode)> {
        let destinations = if request.destinations.iter().any(AirportCode::is_wildcard) {
            Self::popular_destinations()
        } else {
            request.destinations.clone()
        };

        request
            .origins
            .iter()
            .flat_map(|origin| {
                destinations
                    .iter()
                    .take(self.config.max_destinations)
                    .filter(move |d| *d != origin)
                    .map(move |d| (*origin, *d))
            })
            .collect()
    }

    /// Flights for one route.
    pub fn route_flights(
        &self,
        origin: AirportCode,
        destination: AirportCode,
        request: &SearchRequest,
    ) -> Vec<Flight> {
        let mut rng = self.rng_for(origin, destination, request);
        let (a, b) = self.config.flights_per_route;
        let count = rng.gen_range(a.min(b)..=a.max(b));

        (0..count)
            .map(|_| {
                let mut flight = leg(&mut rng, origin, destination, request.departure_date);
                if let Some(return_date) = request.return_date {
                    flight.return_flight =
                        Some(Box::new(leg(&mut rng, destination, origin, return_date)));
                    flight.is_round_trip = true;
                }
                flight
            })
            .collect()
    }

    /// Every flight for `request`, route by route.
    pub fn search(&self, request: &SearchRequest) -> Vec<Flight> {
        self.routes(request)
            .into_iter()
            .flat_map(|(o, d)| self.route_flights(o, d, request))
            .collect()
    }

    /// The streaming form of [`search`](Self::search): one event per route,
    /// then a completion event.
    pub fn events(&self, request: &SearchRequest) -> BoxStream<'static, StreamEvent> {
        let generator = self.clone();
        let request = request.clone();
        let delay = self.config.route_delay;

        async_stream::stream! {
            let mut total = 0;
            for (i, (origin, destination)) in generator.routes(&request).into_iter().enumerate() {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let flights = generator.route_flights(origin, destination, &request);
                total += flights.len();
                yield StreamEvent::Flights {
                    route: Some(format!("{origin}->{destination}")),
                    count: Some(flights.len()),
                    flights,
                };
            }
            yield StreamEvent::Complete { total_flights: Some(total) };
        }
        .boxed()
    }

    fn rng_for(
        &self,
        origin: AirportCode,
        destination: AirportCode,
        request: &SearchRequest,
    ) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.config.seed.hash(&mut hasher);
        origin.as_str().hash(&mut hasher);
        destination.as_str().hash(&mut hasher);
        request.departure_date.hash(&mut hasher);
        request.return_date.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }
}

fn leg(rng: &mut StdRng, origin: AirportCode, destination: AirportCode, date: NaiveDate) -> Flight {
    let hour = rng.gen_range(6..=20);
    let minute = *[0, 15, 30, 45].choose(rng).unwrap_or(&0);
    let duration_mins = rng.gen_range(2..=6) * 60 + *[0, 15, 30, 45].choose(rng).unwrap_or(&0);

    let departure_time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    let departure_at = date.and_time(departure_time);
    let arrival_at = departure_at + TimeDelta::minutes(i64::from(duration_mins));

    let price = (rng.gen_range(29.0..199.0_f64) * 100.0).round() / 100.0;

    Flight {
        origin,
        destination,
        airline: AIRLINE.to_string(),
        flight_number: format!("F9-{}", rng.gen_range(1000..=9999)),
        departure_date: date,
        departure_time,
        arrival_date: arrival_at.date(),
        arrival_time: arrival_at.time(),
        duration_mins: Some(duration_mins),
        stops: *[0, 0, 0, 1].choose(rng).unwrap_or(&0),
        price: Some(price),
        currency: "USD".to_string(),
        seats_remaining: Some(rng.gen_range(1..=15)),
        pass_eligible: *[true, true, false].choose(rng).unwrap_or(&true),
        is_round_trip: false,
        return_flight: None,
    }
}

impl SearchTransport for FlightGenerator {
    async fn open_stream(&self, request: &SearchRequest) -> Result<ByteStream, TransportError> {
        let frames = self.events(request).map(|event| {
            event
                .to_sse_frame()
                .map(String::into_bytes)
                .map_err(|e| TransportError::Json {
                    message: e.to_string(),
                    body: None,
                })
        });
        Ok(frames.boxed())
    }

    async fn fetch_once(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        Ok(SearchResponse {
            flights: self.search(request),
            data_source: Some(DATA_SOURCE.to_string()),
            ..SearchResponse::default()
        })
    }
}
