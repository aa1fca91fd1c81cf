//! Multi-route flight search.
//!
//! Fans one query out across every origin/destination pair, streams partial
//! results back as they arrive, caches completed searches and overlays
//! pass eligibility from a blackout-date calendar.

pub mod cache;
pub mod clock;
pub mod domain;
pub mod eligibility;
pub mod orchestrator;
pub mod planner;
pub mod provider;
pub mod web;
