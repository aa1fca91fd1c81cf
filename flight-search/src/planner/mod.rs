//! Trip planner.
//!
//! Answers: "I want a trip of about this length from one of these airports.
//! What is the earliest departure that works?"
//!
//! The planner scans departure dates one day at a time, searching round
//! trips whose return falls near the target return date, and ranks the
//! trips found on the first day that has any.

mod config;
mod rank;
mod search;

pub use config::PlannerConfig;
pub use rank::rank_trips;
pub use search::{DurationUnit, PlanError, TripOption, TripPlanRequest, TripPlanResult, TripPlanner};
