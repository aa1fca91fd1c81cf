//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::{MemoryStorage, SearchCache};
use crate::eligibility::{CalendarRefresher, FileCalendarSource};
use crate::planner::PlannerConfig;
use crate::provider::FlightGenerator;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Source of flight data
    pub generator: Arc<FlightGenerator>,

    /// Server-side cache for non-streaming searches
    pub cache: Arc<SearchCache<MemoryStorage>>,

    /// Blackout calendar and its refresh policy
    pub calendar: CalendarRefresher<FileCalendarSource>,

    /// Trip planner configuration
    pub planner: Arc<PlannerConfig>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        generator: FlightGenerator,
        cache: SearchCache<MemoryStorage>,
        calendar: CalendarRefresher<FileCalendarSource>,
        planner: PlannerConfig,
    ) -> Self {
        Self {
            generator: Arc::new(generator),
            cache: Arc::new(cache),
            calendar,
            planner: Arc::new(planner),
        }
    }
}
