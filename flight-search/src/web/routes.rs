//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use chrono::NaiveDate;
use futures::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::cache::SearchSnapshot;
use crate::domain::{AirportCode, SearchRequest, TripType};
use crate::eligibility::CalendarRefreshError;
use crate::planner::{PlanError, TripPlanRequest, TripPlanResult, TripPlanner};
use crate::provider::{DATA_SOURCE, FlightGenerator};

use super::dto::*;
use super::state::AppState;

const MISSING_SEARCH_FIELDS: &str = "Missing required fields: origins, destinations, departureDate";
const MISSING_PLAN_FIELDS: &str =
    "Missing required fields: origins, destinations, departureDate, tripLength";

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/api/health", get(api_health))
        .route("/api/search", post(search))
        .route("/api/search/stream", post(search_stream))
        .route("/api/destinations", get(destinations))
        .route("/api/trip-planner", post(trip_planner))
        .route("/api/blackout-dates", get(blackout_dates))
        .route("/api/blackout-dates/refresh", post(refresh_blackout_dates))
        .route("/api/cache/clear", post(clear_cache))
        .route("/api/cache/stats", get(cache_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok",
        service: "Flight Search API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Health check endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Flight Search API is running",
        data_source: DATA_SOURCE,
        calendar_source: state.calendar.engine().snapshot().source.clone(),
    })
}

/// Search all routes at once, through the server cache.
async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchApiResponse>, AppError> {
    let request = parse_search(&body)?;
    let key = request.cache_key();

    if let Some(snapshot) = state.cache.get(&key).await {
        debug!(%key, "returning cached results");
        return Ok(Json(SearchApiResponse {
            count: snapshot.len(),
            flights: snapshot.flights,
            cached: true,
            data_source: snapshot.data_source,
            search_params: body,
        }));
    }

    let snapshot = SearchSnapshot {
        flights: state.generator.search(&request),
        data_source: Some(DATA_SOURCE.to_string()),
    };
    state.cache.set(&key, &snapshot).await;
    info!(%key, flights = snapshot.len(), "generated flights");

    Ok(Json(SearchApiResponse {
        count: snapshot.len(),
        flights: snapshot.flights,
        cached: false,
        data_source: snapshot.data_source,
        search_params: body,
    }))
}

/// Search route by route, one server-sent event per route.
async fn search_stream(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let request = parse_search(&body)?;
    info!(routes = state.generator.routes(&request).len(), "streaming search");

    let events = state
        .generator
        .events(&request)
        .map(|event| Event::default().json_data(&event));
    Ok(Sse::new(events))
}

async fn destinations() -> Json<DestinationsResponse> {
    let destinations = FlightGenerator::popular_destinations();
    Json(DestinationsResponse {
        count: destinations.len(),
        destinations,
    })
}

/// Find the earliest departure with trips of the requested length.
async fn trip_planner(
    State(state): State<AppState>,
    Json(body): Json<TripPlanBody>,
) -> Result<Json<TripPlanResult>, AppError> {
    let request = parse_trip_plan(&body)?;

    let result = TripPlanner::new(state.generator.as_ref(), &state.planner)
        .with_eligibility(state.calendar.engine())
        .plan(&request)
        .await?;

    Ok(Json(result))
}

/// The installed blackout calendar.
async fn blackout_dates(State(state): State<AppState>) -> Json<crate::eligibility::CalendarDocument> {
    Json(state.calendar.engine().snapshot().to_document())
}

/// Re-read the blackout calendar source.
async fn refresh_blackout_dates(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, AppError> {
    let snapshot = state.calendar.refresh_now().await?;
    Ok(Json(RefreshResponse {
        message: "Blackout dates refreshed successfully",
        data: snapshot.to_document(),
    }))
}

async fn clear_cache(State(state): State<AppState>) -> Json<MessageResponse> {
    state.cache.clear().await;
    Json(MessageResponse {
        message: "Cache cleared successfully",
    })
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.cache.stats().await;
    Json(CacheStatsResponse {
        total_entries: stats.total,
        valid_entries: stats.valid,
        expired_entries: stats.expired,
    })
}

fn parse_codes(field: &str, values: &[String]) -> Result<Vec<AirportCode>, AppError> {
    values
        .iter()
        .map(|v| {
            AirportCode::parse_normalized(v).map_err(|e| AppError::BadRequest {
                message: format!("Invalid {field} {v:?}: {e}"),
            })
        })
        .collect()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| AppError::BadRequest {
        message: format!("Invalid {field}: {value}"),
    })
}

/// A non-empty optional field.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_search(body: &SearchBody) -> Result<SearchRequest, AppError> {
    let departure = present(&body.departure_date);
    let (false, false, Some(departure)) =
        (body.origins.is_empty(), body.destinations.is_empty(), departure)
    else {
        return Err(AppError::BadRequest {
            message: MISSING_SEARCH_FIELDS.to_string(),
        });
    };

    let trip_type = match present(&body.trip_type) {
        Some(t) => TripType::parse(t).ok_or_else(|| AppError::BadRequest {
            message: format!("Invalid tripType: {t}"),
        })?,
        None => TripType::default(),
    };

    let request = SearchRequest {
        origins: parse_codes("origin", &body.origins)?,
        destinations: parse_codes("destination", &body.destinations)?,
        trip_type,
        departure_date: parse_date("departureDate", departure)?,
        return_date: present(&body.return_date)
            .map(|d| parse_date("returnDate", d))
            .transpose()?,
    };
    request.validate().map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })?;
    Ok(request)
}

fn parse_trip_plan(body: &TripPlanBody) -> Result<TripPlanRequest, AppError> {
    let departure = present(&body.departure_date);
    let (false, false, Some(departure), Some(trip_length)) = (
        body.origins.is_empty(),
        body.destinations.is_empty(),
        departure,
        body.trip_length,
    ) else {
        return Err(AppError::BadRequest {
            message: MISSING_PLAN_FIELDS.to_string(),
        });
    };

    Ok(TripPlanRequest {
        origins: parse_codes("origin", &body.origins)?,
        destinations: parse_codes("destination", &body.destinations)?,
        departure_date: parse_date("departureDate", departure)?,
        trip_length,
        trip_length_unit: body.trip_length_unit,
        nonstop_preferred: body.nonstop_preferred,
        max_trip_duration: body.max_trip_duration,
        max_trip_duration_unit: body.max_trip_duration_unit,
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Conflict { message: String },
    Internal { message: String },
}

impl From<PlanError> for AppError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::InvalidRequest(message) => AppError::BadRequest { message },
            PlanError::Transport(e) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<CalendarRefreshError> for AppError {
    fn from(e: CalendarRefreshError) -> Self {
        match e {
            CalendarRefreshError::InProgress => AppError::Conflict {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
