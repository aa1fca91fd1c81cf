//! Companion search-provider server.
//!
//! Serves generated flights over the same endpoints a live provider
//! exposes: a streaming search, a cached one-shot search, the trip planner
//! and the blackout calendar.

mod dto;
mod routes;
mod state;


pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
