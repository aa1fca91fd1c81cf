//! Callbacks through which a search session reports progress.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::DomainError;
use crate::eligibility::AnnotatedFlight;
use crate::provider::TransportError;

/// Failure reported to an observer.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Provider rejected the request or the connection failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Provider reported an error event mid-stream
    #[error("provider error: {0}")]
    Provider(String),

    /// Request failed validation before any search was made
    #[error("invalid search request: {0}")]
    Invalid(#[from] DomainError),
}

/// Flights that arrived in one stream event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightBatch {
    /// `"DEN->LAS"`, when the provider names the route.
    pub route: Option<String>,
    pub flights: Vec<AnnotatedFlight>,
}

/// Reported once a session completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionInfo {
    pub total: usize,
    pub from_cache: bool,
}

/// Receives the events of one search session.
///
/// Callbacks run while the orchestrator holds its session lock, so they
/// must not call back into the orchestrator.
pub trait SearchObserver: Send + Sync {
    /// A batch of newly arrived flights. Never repeats earlier batches.
    fn on_flights(&self, batch: &FlightBatch);

    fn on_complete(&self, info: CompletionInfo);

    fn on_error(&self, error: &SearchError);

    /// The provider fell back to another airline's fares.
    fn on_fallback_notice(&self, _notice: &str, _airline: Option<&str>) {}
}

/// Owned form of an observer callback, for forwarding over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchUpdate {
    Flights(FlightBatch),
    Complete(CompletionInfo),
    Error(String),
    FallbackNotice {
        notice: String,
        airline: Option<String>,
    },
}

impl SearchObserver for mpsc::UnboundedSender<SearchUpdate> {
    fn on_flights(&self, batch: &FlightBatch) {
        let _ = self.send(SearchUpdate::Flights(batch.clone()));
    }

    fn on_complete(&self, info: CompletionInfo) {
        let _ = self.send(SearchUpdate::Complete(info));
    }

    fn on_error(&self, error: &SearchError) {
        let _ = self.send(SearchUpdate::Error(error.to_string()));
    }

    fn on_fallback_notice(&self, notice: &str, airline: Option<&str>) {
        let _ = self.send(SearchUpdate::FallbackNotice {
            notice: notice.to_string(),
            airline: airline.map(str::to_string),
        });
    }
}
