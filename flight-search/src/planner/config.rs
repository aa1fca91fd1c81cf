//! Configuration for the trip planner.

use chrono::Duration;

/// Configuration parameters for trip planning.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Maximum number of consecutive departure days to scan.
    pub max_days: u32,

    /// Maximum number of trips to return.
    pub max_results: usize,

    /// Return dates searched on either side of the target return date.
    /// A trip matches if its length is within this many days of the target.
    pub return_flex_days: u32,
}

impl PlannerConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(max_days: u32, max_results: usize, return_flex_days: u32) -> Self {
        Self {
            max_days,
            max_results,
            return_flex_days,
        }
    }

    /// Returns the return-date flexibility as a Duration.
    pub fn return_flex(&self) -> Duration {
        Duration::days(i64::from(self.return_flex_days))
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_days: 30,
            max_results: 20,
            return_flex_days: 2,
        }
    }
}
