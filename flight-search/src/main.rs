use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flight_search::cache::{CacheConfig, MemoryStorage, SearchCache};
use flight_search::eligibility::{
    CalendarRefresher, EligibilityEngine, FileCalendarSource, RefreshConfig,
};
use flight_search::planner::PlannerConfig;
use flight_search::provider::{FlightGenerator, GeneratorConfig};
use flight_search::web::{AppState, create_router};

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_BLACKOUT_FILE: &str = "blackout_cache.json";
const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

/// Read an environment variable, falling back to `default` when unset or
/// unparseable.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!(%name, %value, "ignoring unparseable environment variable");
            default
        }),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port: u16 = env_or("PORT", DEFAULT_PORT);
    let bind: IpAddr = env_or("BIND_ADDR", IpAddr::V4(Ipv4Addr::LOCALHOST));
    let blackout_file: String = env_or("BLACKOUT_FILE", DEFAULT_BLACKOUT_FILE.to_string());
    let cache_ttl = Duration::from_secs(env_or("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS));

    // Blackout calendar: the built-in one until the file loads
    let engine = EligibilityEngine::with_fallback(Utc::now());
    let calendar = CalendarRefresher::new(
        engine,
        FileCalendarSource::new(&blackout_file),
        RefreshConfig::default(),
    );
    let snapshot = calendar.load().await;
    info!(
        source = %snapshot.source,
        periods = snapshot.calendar.len(),
        file = %blackout_file,
        "blackout calendar ready"
    );
    calendar.spawn_periodic();

    let cache_config = CacheConfig::default().with_ttl(cache_ttl);
    let cache = SearchCache::new(MemoryStorage::with_config(&cache_config), cache_config);

    let state = AppState::new(
        FlightGenerator::new(GeneratorConfig::default()),
        cache,
        calendar,
        PlannerConfig::default(),
    );
    let app = create_router(state);

    let addr = SocketAddr::new(bind, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Flight search API listening on http://{addr}");
    info!("  POST /api/search/stream  - Streaming search");
    info!("  POST /api/search         - One-shot search");
    info!("  POST /api/trip-planner   - Trip planner");
    info!("  GET  /api/blackout-dates - Blackout calendar");

    axum::serve(listener, app).await
}
